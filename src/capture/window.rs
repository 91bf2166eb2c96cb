//! Active-window inspection and display information.
//!
//! The pipeline only needs two narrow views of the windowing system: which
//! window is in the foreground (title plus logical bounds) and how the
//! primary display scales logical pixels to physical ones. Both are traits
//! so the pipeline can be driven by mocks in tests.

use anyhow::Result;

/// Logical (pre-scale) bounds of a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Snapshot of the foreground window at capture time.
#[derive(Clone, Debug)]
pub struct ActiveWindow {
    pub title: String,
    pub bounds: WindowBounds,
}

/// Looks up the window currently in the foreground.
pub trait WindowInspector {
    /// Returns the active window, or None when no usable window has focus
    /// (e.g. the desktop or an untitled window).
    fn active_window(&self) -> Result<Option<ActiveWindow>>;
}

/// Reports display scaling and geometry.
pub trait DisplayInfo {
    /// Physical-to-logical pixel ratio of the primary display (1.0 = 100%).
    fn primary_scale_factor(&self) -> f64;

    /// Usable desktop area of the primary display, in logical pixels.
    fn primary_work_area(&self) -> (u32, u32);
}

#[cfg(windows)]
pub use win32::{window_title as win32_window_title, Win32DisplayInfo, Win32WindowInspector};

#[cfg(windows)]
mod win32 {
    use super::*;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{HWND, RECT};
    use windows::Win32::UI::HiDpi::GetDpiForWindow;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
        SystemParametersInfoW, SPI_GETWORKAREA, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
        USER_DEFAULT_SCREEN_DPI,
    };

    /// Reads the window title, or an empty string for untitled windows.
    pub fn window_title(hwnd: HWND) -> String {
        unsafe {
            let len = GetWindowTextLengthW(hwnd);
            if len <= 0 {
                return String::new();
            }
            let mut buf: Vec<u16> = vec![0; (len + 1) as usize];
            GetWindowTextW(hwnd, &mut buf);
            OsString::from_wide(&buf[..len as usize])
                .to_string_lossy()
                .to_string()
        }
    }

    pub struct Win32WindowInspector;

    impl WindowInspector for Win32WindowInspector {
        fn active_window(&self) -> Result<Option<ActiveWindow>> {
            let hwnd = unsafe { GetForegroundWindow() };
            if hwnd.is_invalid() {
                return Ok(None);
            }

            let title = window_title(hwnd);
            if title.is_empty() {
                return Ok(None);
            }

            let mut rect = RECT::default();
            unsafe { GetWindowRect(hwnd, &mut rect)? };

            // GetWindowRect is physical; the thumbnail matcher works in
            // logical bounds, so divide the per-window DPI back out.
            let dpi = unsafe { GetDpiForWindow(hwnd) };
            let scale = if dpi == 0 {
                1.0
            } else {
                dpi as f64 / USER_DEFAULT_SCREEN_DPI as f64
            };

            Ok(Some(ActiveWindow {
                title,
                bounds: WindowBounds {
                    x: (rect.left as f64 / scale).round() as i32,
                    y: (rect.top as f64 / scale).round() as i32,
                    width: ((rect.right - rect.left) as f64 / scale).round() as i32,
                    height: ((rect.bottom - rect.top) as f64 / scale).round() as i32,
                },
            }))
        }
    }

    pub struct Win32DisplayInfo;

    impl DisplayInfo for Win32DisplayInfo {
        fn primary_scale_factor(&self) -> f64 {
            let hwnd = unsafe { GetForegroundWindow() };
            let dpi = if hwnd.is_invalid() {
                0
            } else {
                unsafe { GetDpiForWindow(hwnd) }
            };
            if dpi == 0 {
                1.0
            } else {
                dpi as f64 / USER_DEFAULT_SCREEN_DPI as f64
            }
        }

        fn primary_work_area(&self) -> (u32, u32) {
            let mut rect = RECT::default();
            let ok = unsafe {
                SystemParametersInfoW(
                    SPI_GETWORKAREA,
                    0,
                    Some(&mut rect as *mut _ as *mut _),
                    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
                )
            };
            if ok.is_err() {
                return (0, 0);
            }
            (
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            )
        }
    }
}
