use std::path::PathBuf;
use std::sync::OnceLock;

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the application data directory: `<local data>/test-helper/`
pub fn get_data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("test-helper")
    })
}

/// Returns the logs directory: `<data_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Returns the debug dump directory: `<data_dir>/debug/`
///
/// Holds the original and processed crops from the latest capture,
/// useful when diagnosing bad OCR results.
pub fn get_debug_dir() -> PathBuf {
    get_data_dir().join("debug")
}

/// Returns the tesseract directory: `<data_dir>/tesseract/`
pub fn get_tesseract_dir() -> PathBuf {
    get_data_dir().join("tesseract")
}

/// Returns the settings file path: `<data_dir>/settings.json`
pub fn get_settings_path() -> PathBuf {
    get_data_dir().join("settings.json")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_debug_dir())?;
    std::fs::create_dir_all(get_tesseract_dir())?;
    Ok(())
}
