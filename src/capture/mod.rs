//! Screen capture functionality for the foreground window.
//!
//! This module provides:
//! - Capture region geometry (`compute_region`)
//! - Active-window and display inspection (`WindowInspector`, `DisplayInfo`)
//! - Window thumbnail capture (`ScreenCapture`)

pub mod region;
pub mod screenshot;
pub mod window;

pub use region::{compute_region, CaptureRegion};
pub use screenshot::{PixelSize, ScreenCapture, WindowSource};
pub use window::{ActiveWindow, DisplayInfo, WindowBounds, WindowInspector};

#[cfg(windows)]
pub use screenshot::GraphicsCapture;
#[cfg(windows)]
pub use window::{Win32DisplayInfo, Win32WindowInspector};
