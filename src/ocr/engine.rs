use anyhow::{anyhow, Result};
use image::GrayImage;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable, validate_assets, LANGUAGE};

/// Characters tesseract is allowed to recognize: Latin letters with the
/// Portuguese diacritics, digits, and common question punctuation.
pub const CHAR_WHITELIST: &str = "abcdefghijklmnopqrstuvwxyz\
ABCDEFGHIJKLMNOPQRSTUVWXYZ\
áàâãéêíóôõúüçÁÀÂÃÉÊÍÓÔÕÚÜÇ\
0123456789\
.,;:!?()%-+/= ";

/// Explicit OCR configuration. Every recognized knob is a named field;
/// there is no pass-through of arbitrary options.
#[derive(Clone, Debug)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    /// Page segmentation mode. 6 = assume a single uniform block of text.
    pub page_seg_mode: u8,
    /// Characters the engine may emit. Empty disables the whitelist.
    pub char_whitelist: String,
    /// Keep multiple spaces between words instead of collapsing them.
    pub preserve_interword_spaces: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: LANGUAGE.to_string(),
            page_seg_mode: 6,
            char_whitelist: CHAR_WHITELIST.to_string(),
            preserve_interword_spaces: true,
        }
    }
}

impl OcrConfig {
    /// Validates field values. Tesseract accepts PSM 0-13.
    pub fn validate(&self) -> Result<()> {
        if self.language.is_empty() {
            return Err(anyhow!("OCR language must not be empty"));
        }
        if self.page_seg_mode > 13 {
            return Err(anyhow!(
                "Invalid page segmentation mode: {}",
                self.page_seg_mode
            ));
        }
        Ok(())
    }
}

/// Result of one recognition pass.
#[derive(Clone, Debug)]
pub struct OcrResult {
    pub text: String,
    /// Mean word confidence, 0-100.
    pub confidence: f32,
}

/// The recognition capability the pipeline depends on.
pub trait OcrEngine {
    /// Verifies the engine's assets (executable, language data) exist.
    /// Returns the list of missing items on failure.
    fn check_assets(&self) -> Result<(), Vec<String>>;

    /// Recognizes text in a normalized greyscale image.
    fn recognize(&self, img: &GrayImage, config: &OcrConfig) -> Result<OcrResult>;
}

/// OCR engine backed by the tesseract executable.
pub struct TesseractEngine;

impl OcrEngine for TesseractEngine {
    fn check_assets(&self) -> Result<(), Vec<String>> {
        let missing = validate_assets();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    fn recognize(&self, img: &GrayImage, config: &OcrConfig) -> Result<OcrResult> {
        config.validate()?;

        let tesseract_exe = find_tesseract_executable()?;
        let tessdata_dir = find_tessdata_dir()?;

        // Exchange files: PNG in, TSV out (tesseract appends .tsv itself)
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut cmd = Command::new(&tesseract_exe);
        cmd.arg(temp_input.path())
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&tessdata_dir)
            .arg("-l")
            .arg(&config.language)
            .arg("--psm")
            .arg(config.page_seg_mode.to_string());

        if !config.char_whitelist.is_empty() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", config.char_whitelist));
        }
        if config.preserve_interword_spaces {
            cmd.arg("-c").arg("preserve_interword_spaces=1");
        }
        cmd.arg("tsv");

        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Reassembles line text and mean word confidence from tesseract TSV.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Level 5 rows are words.
fn parse_tsv_output(tsv: &str) -> OcrResult {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line: Option<(i32, i32, Vec<String>)> = None; // (block, line, words)
    let mut conf_sum = 0.0f32;
    let mut word_count = 0usize;

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }
        let block_num: i32 = fields[2].parse().unwrap_or(-1);
        let line_num: i32 = fields[4].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        match &mut current_line {
            Some((block, line, words)) if *block == block_num && *line == line_num => {
                words.push(text.to_string());
            }
            _ => {
                if let Some((_, _, words)) = current_line.take() {
                    lines.push(words.join(" "));
                }
                current_line = Some((block_num, line_num, vec![text.to_string()]));
            }
        }

        if conf >= 0.0 {
            conf_sum += conf;
            word_count += 1;
        }
    }

    if let Some((_, _, words)) = current_line.take() {
        lines.push(words.join(" "));
    }

    let confidence = if word_count > 0 {
        conf_sum / word_count as f32
    } else {
        0.0
    };

    OcrResult {
        text: lines.join("\n"),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = OcrConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.language, "por");
        assert_eq!(config.page_seg_mode, 6);
        assert!(config.preserve_interword_spaces);
        assert!(config.char_whitelist.contains('ã'));
        assert!(config.char_whitelist.contains('?'));
    }

    #[test]
    fn test_config_rejects_bad_psm() {
        let config = OcrConfig {
            page_seg_mode: 14,
            ..OcrConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_empty_language() {
        let config = OcrConfig {
            language: String::new(),
            ..OcrConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_tsv_output() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\t1.\n\
                   5\t1\t1\t1\t1\t2\t12\t0\t30\t10\t80\tQual\n\
                   5\t1\t1\t1\t2\t1\t0\t12\t10\t10\t70\ta)\n\
                   5\t1\t1\t1\t2\t2\t12\t12\t30\t10\t60\tParis\n";

        let result = parse_tsv_output(tsv);
        assert_eq!(result.text, "1. Qual\na) Paris");
        assert!((result.confidence - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_tsv_output_empty() {
        let result = parse_tsv_output("level\tpage_num\n");
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }
}
