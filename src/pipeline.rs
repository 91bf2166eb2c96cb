//! The capture pipeline.
//!
//! One hotkey press drives one linear run: window info → region → capture →
//! classify → normalize → OCR → validate → parse → format → answer. Any
//! step failure short-circuits to a terminal `Failure` that is handed to
//! the presenter; nothing propagates past this boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;

use crate::ai::AnswerService;
use crate::capture::{compute_region, DisplayInfo, PixelSize, ScreenCapture, WindowInspector};
use crate::log;
use crate::ocr::{classify, normalize, OcrConfig, OcrEngine};
use crate::parser::{format_for_ai, is_valid_question, parse_question};
use crate::presenter::Presenter;
use crate::settings::Settings;

/// Why a pipeline run terminated without an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Disabled,
    MissingAssets,
    NoActiveWindow,
    CaptureTargetNotFound,
    EmptyOcrResult,
    NotAQuestion,
    AnswerService,
}

impl FailureReason {
    /// Stable machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Disabled => "disabled",
            FailureReason::MissingAssets => "missing-assets",
            FailureReason::NoActiveWindow => "no-active-window",
            FailureReason::CaptureTargetNotFound => "capture-target-not-found",
            FailureReason::EmptyOcrResult => "empty-ocr",
            FailureReason::NotAQuestion => "not-a-question",
            FailureReason::AnswerService => "ai-error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    /// Default user-facing message, in the product language.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Disabled => {
                write!(f, "A captura está desativada nas configurações")
            }
            FailureReason::MissingAssets => {
                write!(f, "Arquivos necessários para o OCR não foram encontrados")
            }
            FailureReason::NoActiveWindow => {
                write!(f, "Não foi possível detectar a janela ativa")
            }
            FailureReason::CaptureTargetNotFound => {
                write!(f, "Não foi possível capturar a janela alvo")
            }
            FailureReason::EmptyOcrResult => {
                write!(f, "Não foi possível extrair texto da imagem")
            }
            FailureReason::NotAQuestion => {
                write!(f, "O texto capturado não parece ser uma questão")
            }
            FailureReason::AnswerService => {
                write!(f, "Não foi possível obter uma resposta da IA")
            }
        }
    }
}

/// Terminal value of one pipeline run.
#[derive(Clone, Debug)]
pub enum CaptureOutcome {
    Success {
        answer: String,
    },
    Failure {
        reason: FailureReason,
        message: String,
    },
}

impl CaptureOutcome {
    fn failure(reason: FailureReason) -> Self {
        CaptureOutcome::Failure {
            message: reason.to_string(),
            reason,
        }
    }

    fn failure_with(reason: FailureReason, message: String) -> Self {
        CaptureOutcome::Failure { reason, message }
    }
}

/// Per-run pipeline context. Built fresh for each hotkey press from the
/// current settings snapshot and the long-lived collaborators.
pub struct CapturePipeline<'a> {
    settings: Settings,
    ocr_config: OcrConfig,
    inspector: &'a dyn WindowInspector,
    display: &'a dyn DisplayInfo,
    capture: &'a dyn ScreenCapture,
    ocr: &'a dyn OcrEngine,
    answers: &'a dyn AnswerService,
    presenter: &'a dyn Presenter,
    busy: &'a AtomicBool,
}

impl<'a> CapturePipeline<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        inspector: &'a dyn WindowInspector,
        display: &'a dyn DisplayInfo,
        capture: &'a dyn ScreenCapture,
        ocr: &'a dyn OcrEngine,
        answers: &'a dyn AnswerService,
        presenter: &'a dyn Presenter,
        busy: &'a AtomicBool,
    ) -> Self {
        Self {
            settings,
            ocr_config: OcrConfig::default(),
            inspector,
            display,
            capture,
            ocr,
            answers,
            presenter,
            busy,
        }
    }

    /// Runs the pipeline once and reports the outcome to the presenter.
    ///
    /// Re-triggers while a run is in flight are rejected without touching
    /// the presenter, so they cannot clobber the in-flight run's output.
    pub fn run(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            log("Capture already in flight, ignoring trigger");
            return;
        }

        let outcome = self.execute();
        match &outcome {
            CaptureOutcome::Success { .. } => log("Capture finished: success"),
            CaptureOutcome::Failure { reason, message } => {
                log(&format!("Capture failed [{}]: {}", reason.code(), message))
            }
        }
        self.presenter.show_result(&outcome);

        self.busy.store(false, Ordering::SeqCst);
    }

    fn execute(&self) -> CaptureOutcome {
        // 1. Feature flag
        if !self.settings.app_enabled {
            return CaptureOutcome::failure(FailureReason::Disabled);
        }

        // 2. OCR assets
        if let Err(missing) = self.ocr.check_assets() {
            log(&format!("Missing OCR assets: {}", missing.join(", ")));
            crate::ocr::setup::log_debug_info();
            return CaptureOutcome::failure(FailureReason::MissingAssets);
        }

        // 3. Foreground window
        let window = match self.inspector.active_window() {
            Ok(Some(window)) => window,
            Ok(None) => return CaptureOutcome::failure(FailureReason::NoActiveWindow),
            Err(e) => {
                return CaptureOutcome::failure_with(
                    FailureReason::NoActiveWindow,
                    format!("{}: {}", FailureReason::NoActiveWindow, e),
                )
            }
        };
        log(&format!(
            "Active window: \"{}\" ({}x{})",
            window.title, window.bounds.width, window.bounds.height
        ));

        self.presenter.show_loading();

        // 4. Capture a thumbnail of the window at physical resolution
        let scale = self.display.primary_scale_factor();
        let target = PixelSize {
            width: (window.bounds.width.max(0) as f64 * scale).round() as u32,
            height: (window.bounds.height.max(0) as f64 * scale).round() as u32,
        };

        let sources = match self.capture.list_window_sources(target) {
            Ok(sources) => sources,
            Err(e) => {
                return CaptureOutcome::failure_with(
                    FailureReason::CaptureTargetNotFound,
                    format!("{}: {}", FailureReason::CaptureTargetNotFound, e),
                )
            }
        };

        let Some(source) = sources.into_iter().find(|s| s.name == window.title) else {
            return CaptureOutcome::failure(FailureReason::CaptureTargetNotFound);
        };

        // 5. Crop to the question region
        let (thumb_width, thumb_height) = source.thumbnail.dimensions();
        let region = compute_region(thumb_width, thumb_height);
        log(&format!(
            "Capture region: {}x{} at ({}, {}) in {}x{} thumbnail",
            region.width, region.height, region.x, region.y, thumb_width, thumb_height
        ));

        if region.is_empty() {
            return CaptureOutcome::failure(FailureReason::EmptyOcrResult);
        }

        let cropped = image::imageops::crop_imm(
            &source.thumbnail,
            region.x,
            region.y,
            region.width,
            region.height,
        )
        .to_image();

        // 6. Classify background and normalize for OCR
        let profile = classify(&cropped);
        log(&format!(
            "Background: {} (brightness {:.1}, saturation {:.1})",
            profile.category, profile.average_brightness, profile.average_saturation
        ));
        let normalized = normalize(&cropped, profile.category);

        self.dump_debug_images(&cropped, &normalized);

        // 7. OCR
        let ocr_result = match self.ocr.recognize(&normalized, &self.ocr_config) {
            Ok(result) => result,
            Err(e) => {
                return CaptureOutcome::failure_with(
                    FailureReason::EmptyOcrResult,
                    format!("{}: {}", FailureReason::EmptyOcrResult, e),
                )
            }
        };
        log(&format!(
            "OCR produced {} chars (confidence {:.0}%)",
            ocr_result.text.len(),
            ocr_result.confidence
        ));

        if ocr_result.text.trim().is_empty() {
            return CaptureOutcome::failure(FailureReason::EmptyOcrResult);
        }

        // 8. Validate and parse
        if !is_valid_question(&ocr_result.text) {
            return CaptureOutcome::failure(FailureReason::NotAQuestion);
        }

        let parsed = parse_question(&ocr_result.text);
        let formatted = format_for_ai(&parsed);

        // 9. Delegate to the answer service
        match self.answers.get_answer(&formatted) {
            Ok(answer) => CaptureOutcome::Success { answer },
            Err(e) => CaptureOutcome::failure_with(FailureReason::AnswerService, e.to_string()),
        }
    }

    /// Writes the original and processed crops for diagnostics.
    /// Failures here never affect the run.
    fn dump_debug_images(
        &self,
        original: &image::ImageBuffer<image::Rgba<u8>, Vec<u8>>,
        processed: &image::GrayImage,
    ) {
        let debug_dir = crate::paths::get_debug_dir();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let _ = original.save(debug_dir.join(format!("capture_{}_original.png", timestamp)));
        let _ = processed.save(debug_dir.join(format!("capture_{}_processed.png", timestamp)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ActiveWindow, WindowBounds, WindowSource};
    use crate::ocr::{OcrResult, OcrEngine};
    use anyhow::{anyhow, Result};
    use image::{GrayImage, ImageBuffer, Rgba};
    use std::cell::{Cell, RefCell};

    struct MockInspector {
        window: Option<ActiveWindow>,
        calls: Cell<usize>,
    }

    impl WindowInspector for MockInspector {
        fn active_window(&self) -> Result<Option<ActiveWindow>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.window.clone())
        }
    }

    struct MockDisplay;

    impl DisplayInfo for MockDisplay {
        fn primary_scale_factor(&self) -> f64 {
            1.25
        }
        fn primary_work_area(&self) -> (u32, u32) {
            (1920, 1040)
        }
    }

    struct MockCapture {
        sources: Vec<(String, u32, u32)>,
        calls: Cell<usize>,
        last_target: Cell<Option<PixelSize>>,
    }

    impl ScreenCapture for MockCapture {
        fn list_window_sources(&self, target: PixelSize) -> Result<Vec<WindowSource>> {
            self.calls.set(self.calls.get() + 1);
            self.last_target.set(Some(target));
            Ok(self
                .sources
                .iter()
                .map(|(name, w, h)| WindowSource {
                    name: name.clone(),
                    thumbnail: ImageBuffer::from_pixel(*w, *h, Rgba([255, 255, 255, 255])),
                })
                .collect())
        }
    }

    struct MockOcr {
        text: &'static str,
        assets_ok: bool,
        calls: Cell<usize>,
    }

    impl OcrEngine for MockOcr {
        fn check_assets(&self) -> Result<(), Vec<String>> {
            if self.assets_ok {
                Ok(())
            } else {
                Err(vec!["por.traineddata".to_string()])
            }
        }

        fn recognize(&self, _img: &GrayImage, _config: &OcrConfig) -> Result<OcrResult> {
            self.calls.set(self.calls.get() + 1);
            Ok(OcrResult {
                text: self.text.to_string(),
                confidence: 90.0,
            })
        }
    }

    struct MockAnswers {
        answer: Result<&'static str, &'static str>,
        calls: Cell<usize>,
        received: RefCell<Vec<String>>,
    }

    impl AnswerService for MockAnswers {
        fn get_answer(&self, formatted_text: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.received.borrow_mut().push(formatted_text.to_string());
            match self.answer {
                Ok(answer) => Ok(answer.to_string()),
                Err(message) => Err(anyhow!(message)),
            }
        }
    }

    #[derive(Default)]
    struct MockPresenter {
        loading_calls: Cell<usize>,
        outcomes: RefCell<Vec<CaptureOutcome>>,
    }

    impl Presenter for MockPresenter {
        fn show_loading(&self) {
            self.loading_calls.set(self.loading_calls.get() + 1);
        }
        fn show_result(&self, outcome: &CaptureOutcome) {
            self.outcomes.borrow_mut().push(outcome.clone());
        }
    }

    const QUESTION_TEXT: &str =
        "1. Qual a capital da França?\na) Paris\nb) Lyon\nc) Marselha";

    struct Fixture {
        inspector: MockInspector,
        display: MockDisplay,
        capture: MockCapture,
        ocr: MockOcr,
        answers: MockAnswers,
        presenter: MockPresenter,
        busy: AtomicBool,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                inspector: MockInspector {
                    window: Some(ActiveWindow {
                        title: "Prova Online - Chrome".to_string(),
                        bounds: WindowBounds {
                            x: 0,
                            y: 0,
                            width: 800,
                            height: 600,
                        },
                    }),
                    calls: Cell::new(0),
                },
                display: MockDisplay,
                capture: MockCapture {
                    sources: vec![("Prova Online - Chrome".to_string(), 1000, 750)],
                    calls: Cell::new(0),
                    last_target: Cell::new(None),
                },
                ocr: MockOcr {
                    text: QUESTION_TEXT,
                    assets_ok: true,
                    calls: Cell::new(0),
                },
                answers: MockAnswers {
                    answer: Ok("A capital da França é Paris."),
                    calls: Cell::new(0),
                    received: RefCell::new(Vec::new()),
                },
                presenter: MockPresenter::default(),
                busy: AtomicBool::new(false),
                settings: Settings::default(),
            }
        }

        fn run(&self) {
            let pipeline = CapturePipeline::new(
                self.settings.clone(),
                &self.inspector,
                &self.display,
                &self.capture,
                &self.ocr,
                &self.answers,
                &self.presenter,
                &self.busy,
            );
            pipeline.run();
        }

        fn single_outcome(&self) -> CaptureOutcome {
            let outcomes = self.presenter.outcomes.borrow();
            assert_eq!(outcomes.len(), 1, "expected exactly one presented outcome");
            outcomes[0].clone()
        }

        fn assert_failed_with(&self, expected: FailureReason) {
            match self.single_outcome() {
                CaptureOutcome::Failure { reason, .. } => assert_eq!(reason, expected),
                CaptureOutcome::Success { .. } => panic!("expected failure"),
            }
        }
    }

    #[test]
    fn test_success_path() {
        let fixture = Fixture::new();
        fixture.run();

        match fixture.single_outcome() {
            CaptureOutcome::Success { answer } => {
                assert_eq!(answer, "A capital da França é Paris.")
            }
            CaptureOutcome::Failure { reason, message } => {
                panic!("expected success, got {}: {}", reason.code(), message)
            }
        }

        assert_eq!(fixture.presenter.loading_calls.get(), 1);
        assert_eq!(fixture.ocr.calls.get(), 1);
        assert_eq!(fixture.answers.calls.get(), 1);

        // The answer service receives the structured format, not raw OCR
        let received = fixture.answers.received.borrow();
        assert!(received[0].contains("QUESTÃO 1"));
        assert!(received[0].contains("a) Paris"));

        // Busy flag released for the next run
        assert!(!fixture.busy.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thumbnail_target_scaled_to_physical_pixels() {
        let fixture = Fixture::new();
        fixture.run();

        let target = fixture.capture.last_target.get().unwrap();
        assert_eq!(target, PixelSize {
            width: 1000,
            height: 750,
        });
    }

    #[test]
    fn test_disabled_short_circuits_before_any_capture() {
        let mut fixture = Fixture::new();
        fixture.settings.app_enabled = false;
        fixture.run();

        fixture.assert_failed_with(FailureReason::Disabled);
        assert_eq!(fixture.inspector.calls.get(), 0);
        assert_eq!(fixture.capture.calls.get(), 0);
        assert_eq!(fixture.ocr.calls.get(), 0);
        assert_eq!(fixture.presenter.loading_calls.get(), 0);
    }

    #[test]
    fn test_missing_assets() {
        let mut fixture = Fixture::new();
        fixture.ocr.assets_ok = false;
        fixture.run();

        fixture.assert_failed_with(FailureReason::MissingAssets);
        assert_eq!(fixture.inspector.calls.get(), 0);
        assert_eq!(fixture.capture.calls.get(), 0);
    }

    #[test]
    fn test_no_active_window() {
        let mut fixture = Fixture::new();
        fixture.inspector.window = None;
        fixture.run();

        fixture.assert_failed_with(FailureReason::NoActiveWindow);
        assert_eq!(fixture.capture.calls.get(), 0);
    }

    #[test]
    fn test_capture_target_not_found() {
        let mut fixture = Fixture::new();
        fixture.capture.sources = vec![("Outra Janela".to_string(), 1000, 750)];
        fixture.run();

        fixture.assert_failed_with(FailureReason::CaptureTargetNotFound);
        assert_eq!(fixture.ocr.calls.get(), 0);
    }

    #[test]
    fn test_empty_ocr_result() {
        let mut fixture = Fixture::new();
        fixture.ocr.text = "   \n  ";
        fixture.run();

        fixture.assert_failed_with(FailureReason::EmptyOcrResult);
        assert_eq!(fixture.answers.calls.get(), 0);
    }

    #[test]
    fn test_not_a_question() {
        let mut fixture = Fixture::new();
        fixture.ocr.text = "apenas ruido de interface sem nenhuma estrutura de prova";
        fixture.run();

        fixture.assert_failed_with(FailureReason::NotAQuestion);
        assert_eq!(fixture.answers.calls.get(), 0);
    }

    #[test]
    fn test_answer_service_error_is_surfaced() {
        let mut fixture = Fixture::new();
        fixture.answers.answer = Err("Chave da API OpenAI inválida");
        fixture.run();

        match fixture.single_outcome() {
            CaptureOutcome::Failure { reason, message } => {
                assert_eq!(reason, FailureReason::AnswerService);
                assert_eq!(message, "Chave da API OpenAI inválida");
            }
            CaptureOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn test_busy_guard_rejects_overlapping_run() {
        let fixture = Fixture::new();
        fixture.busy.store(true, Ordering::SeqCst);
        fixture.run();

        // Rejected runs never reach the presenter or collaborators
        assert!(fixture.presenter.outcomes.borrow().is_empty());
        assert_eq!(fixture.inspector.calls.get(), 0);
        // The in-flight flag is left for the owning run to clear
        assert!(fixture.busy.load(Ordering::SeqCst));
    }

    #[test]
    fn test_degenerate_thumbnail_is_empty_image_failure() {
        let mut fixture = Fixture::new();
        fixture.capture.sources = vec![("Prova Online - Chrome".to_string(), 0, 0)];
        fixture.run();

        fixture.assert_failed_with(FailureReason::EmptyOcrResult);
        assert_eq!(fixture.ocr.calls.get(), 0);
    }
}
