//! Outcome presentation.
//!
//! The pipeline never talks to the UI directly; it hands its terminal
//! outcome to a `Presenter`.

use crate::log;
use crate::pipeline::CaptureOutcome;

pub trait Presenter {
    /// Signals that a capture run has started and an answer is pending.
    fn show_loading(&self);
    /// Presents the terminal outcome of a run.
    fn show_result(&self, outcome: &CaptureOutcome);
}

/// Log-only presenter. Useful when no interactive surface is available.
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show_loading(&self) {
        log("Analisando a questão...");
    }

    fn show_result(&self, outcome: &CaptureOutcome) {
        match outcome {
            CaptureOutcome::Success { answer } => {
                log("--- Resposta ---");
                log(answer);
            }
            CaptureOutcome::Failure { message, .. } => log(message),
        }
    }
}

#[cfg(windows)]
pub use win32::MessageBoxPresenter;

#[cfg(windows)]
mod win32 {
    use super::*;
    use windows::core::HSTRING;
    use windows::Win32::UI::WindowsAndMessaging::{
        MessageBoxW, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK,
    };

    /// Presents outcomes through native message boxes.
    pub struct MessageBoxPresenter;

    impl Presenter for MessageBoxPresenter {
        fn show_loading(&self) {
            // A blocking message box here would stall the run; the log
            // line is the loading indicator.
            log("Analisando a questão...");
        }

        fn show_result(&self, outcome: &CaptureOutcome) {
            let (title, body, icon) = match outcome {
                CaptureOutcome::Success { answer } => {
                    ("Resposta", answer.as_str(), MB_ICONINFORMATION)
                }
                CaptureOutcome::Failure { message, .. } => {
                    ("Aviso", message.as_str(), MB_ICONWARNING)
                }
            };
            unsafe {
                MessageBoxW(
                    None,
                    &HSTRING::from(body),
                    &HSTRING::from(title),
                    MB_OK | icon,
                );
            }
        }
    }
}
