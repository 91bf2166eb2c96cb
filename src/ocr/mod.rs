//! OCR support: asset management, tesseract invocation, and the image
//! preprocessing that makes captured question regions legible.

pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrConfig, OcrEngine, OcrResult, TesseractEngine};
pub use preprocess::{classify, normalize, BackgroundCategory, BackgroundProfile};
pub use setup::ensure_tesseract;
