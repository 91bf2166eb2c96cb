use anyhow::{anyhow, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Language model used for recognition (Portuguese).
pub const LANGUAGE: &str = "por";

#[cfg(windows)]
const TESSERACT_BINARY: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_BINARY: &str = "tesseract";

/// Resolved locations of the tesseract executable and language data.
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Ensures tesseract and por.traineddata are available, downloading the
/// language data if necessary.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;

    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(_) => {
            log("por.traineddata not found locally, downloading...");
            let tessdata_dir = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&tessdata_dir)?;
            download_tessdata(&tessdata_dir)?;
            tessdata_dir
        }
    };

    log(&format!(
        "Tesseract ready: {} (tessdata: {})",
        executable.display(),
        tessdata.display()
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Checks assets without downloading. Returns the missing items, in the
/// same shape the validity report of the original tooling used.
pub fn validate_assets() -> Vec<String> {
    let mut missing = Vec::new();

    if find_tesseract_executable().is_err() {
        missing.push("Executável do Tesseract".to_string());
    }
    if find_tessdata_dir().is_err() {
        missing.push(format!(
            "Arquivo de idioma: {}.traineddata",
            LANGUAGE
        ));
    }

    missing
}

/// Logs resolved paths and platform info. Called when assets are missing
/// so support tickets carry enough context.
pub fn log_debug_info() {
    log("=== OCR asset debug info ===");
    log(&format!("  data dir: {}", crate::paths::get_data_dir().display()));
    log(&format!("  tesseract dir: {}", get_tesseract_dir().display()));
    log(&format!(
        "  executable: {}",
        find_tesseract_executable()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("not found ({})", e))
    ));
    log(&format!(
        "  tessdata: {}",
        find_tessdata_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("not found ({})", e))
    ));
    log(&format!("  platform: {}", std::env::consts::OS));
    log(&format!("  arch: {}", std::env::consts::ARCH));
    log("============================");
}

/// Downloads por.traineddata from the tessdata GitHub repository.
fn download_tessdata(tessdata_dir: &PathBuf) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, LANGUAGE);
    let path = tessdata_dir.join(format!("{}.traineddata", LANGUAGE));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "test-helper")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            LANGUAGE,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&path)?;
    file.write_all(&bytes)?;

    log(&format!(
        "Downloaded {}.traineddata ({} bytes)",
        LANGUAGE,
        bytes.len()
    ));

    Ok(())
}

/// Finds the tesseract executable, checking our local dir first, then PATH,
/// then common install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(TESSERACT_BINARY);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in common_install_paths() {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing por.traineddata.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let traineddata = format!("{}.traineddata", LANGUAGE);

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(&traineddata).exists() {
        return Ok(local_tessdata);
    }

    for path in common_tessdata_paths() {
        let p = PathBuf::from(path);
        if p.join(&traineddata).exists() {
            return Ok(p);
        }
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(&traineddata).exists() {
            return Ok(p);
        }
        let p = PathBuf::from(&prefix).join("tessdata");
        if p.join(&traineddata).exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {} is available.",
        traineddata
    ))
}

#[cfg(windows)]
fn common_install_paths() -> &'static [&'static str] {
    &[
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    ]
}

#[cfg(not(windows))]
fn common_install_paths() -> &'static [&'static str] {
    &["/usr/bin/tesseract", "/usr/local/bin/tesseract"]
}

#[cfg(windows)]
fn common_tessdata_paths() -> &'static [&'static str] {
    &[
        r"C:\Program Files\Tesseract-OCR\tessdata",
        r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    ]
}

#[cfg(not(windows))]
fn common_tessdata_paths() -> &'static [&'static str] {
    &[
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/local/share/tessdata",
    ]
}
