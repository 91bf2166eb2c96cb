//! Test Helper
//!
//! A Windows system tray application that captures the foreground window,
//! extracts a test question from it with OCR, and asks an AI service for
//! the answer. Triggered by a global hotkey.

// Hide console window on Windows for GUI mode
#![cfg_attr(windows, windows_subsystem = "windows")]

mod ai;
mod capture;
mod ocr;
mod parser;
mod paths;
mod pipeline;
mod presenter;
mod settings;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("test_helper.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}", location, msg);
        eprintln!("{}", log_msg);
        log(&log_msg);
    }));
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("test-helper requires Windows (Graphics Capture API and global hotkeys).");
    std::process::exit(1);
}

#[cfg(windows)]
mod app {
    use super::{install_panic_hook, log, paths};
    use crate::ai::OpenAiClient;
    use crate::capture::{GraphicsCapture, Win32DisplayInfo, Win32WindowInspector};
    use crate::ocr::{self, TesseractEngine};
    use crate::pipeline::{CaptureOutcome, CapturePipeline, FailureReason};
    use crate::presenter::{MessageBoxPresenter, Presenter};
    use crate::settings::SettingsStore;

    use anyhow::{anyhow, Result};
    use std::sync::atomic::AtomicBool;
    use std::sync::{Mutex, OnceLock};

    use windows::core::w;
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_NOREPEAT,
    };
    use windows::Win32::UI::Shell::{
        Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu, DestroyWindow,
        DispatchMessageW, GetCursorPos, GetMessageW, InsertMenuW, LoadIconW, PostQuitMessage,
        RegisterClassW, SetForegroundWindow, TrackPopupMenu, TranslateMessage, CS_HREDRAW,
        CS_VREDRAW, CW_USEDEFAULT, IDI_APPLICATION, MF_BYPOSITION, MF_CHECKED, MF_SEPARATOR,
        MF_STRING, MF_UNCHECKED, MSG, TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RIGHTBUTTON, WM_COMMAND,
        WM_DESTROY, WM_HOTKEY, WM_LBUTTONDBLCLK, WM_RBUTTONUP, WM_USER, WNDCLASSW,
        WS_OVERLAPPEDWINDOW,
    };

    const HOTKEY_CAPTURE: i32 = 1;
    const WM_TRAYICON: u32 = WM_USER + 1;

    // Menu item IDs
    const MENU_TOGGLE: usize = 1001;
    const MENU_EXIT: usize = 1002;

    static STORE: OnceLock<Mutex<SettingsStore>> = OnceLock::new();
    static CAPTURE_BUSY: AtomicBool = AtomicBool::new(false);

    fn store() -> &'static Mutex<SettingsStore> {
        STORE.get_or_init(|| Mutex::new(SettingsStore::load(&paths::get_settings_path())))
    }

    pub fn run() -> Result<()> {
        install_panic_hook();

        paths::ensure_directories()?;

        // Warm the settings store before any hotkey can fire
        {
            let guard = store().lock().map_err(|_| anyhow!("settings store poisoned"))?;
            log(&format!(
                "Settings loaded (capture {})",
                if guard.get().app_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            ));
        }

        // Ensure Tesseract and Portuguese language data are available
        if let Err(e) = ocr::ensure_tesseract() {
            log(&format!("Warning: Failed to setup Tesseract: {}", e));
            log("OCR features may not work correctly.");
        }

        run_tray_app()
    }

    /// Runs the main system tray application with hotkey handling.
    fn run_tray_app() -> Result<()> {
        // Create hidden window for message handling
        let hwnd = create_message_window()?;

        // Add system tray icon
        add_tray_icon(hwnd)?;

        // Register global hotkey: Ctrl+T for capture
        unsafe {
            RegisterHotKey(hwnd, HOTKEY_CAPTURE, MOD_CONTROL | MOD_NOREPEAT, 0x54)?;
        }

        log("Test Helper started");
        log("Hotkey: Ctrl+T (capture question)");
        log("Right-click tray icon for options");

        // Message loop
        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            // Cleanup
            let _ = UnregisterHotKey(hwnd, HOTKEY_CAPTURE);
            remove_tray_icon(hwnd);
            let _ = DestroyWindow(hwnd);
        }

        Ok(())
    }

    /// Runs the full capture pipeline on a worker thread so the message
    /// loop stays responsive while OCR and the answer request run.
    fn trigger_capture() {
        log("Hotkey pressed! Capturing...");

        let snapshot = match store().lock() {
            Ok(guard) => guard.snapshot(),
            Err(_) => {
                log("Settings store poisoned, ignoring capture");
                return;
            }
        };

        std::thread::spawn(move || {
            // Graphics Capture needs WinRT initialized on this thread
            let init = unsafe {
                windows::Win32::System::WinRT::RoInitialize(
                    windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
                )
            };
            if let Err(e) = init {
                log(&format!("RoInitialize failed: {}", e));
            }

            let presenter = MessageBoxPresenter;

            let client = match OpenAiClient::new(snapshot.openai_api_key.as_deref()) {
                Ok(client) => client,
                Err(e) => {
                    log(&format!("Answer service unavailable: {}", e));
                    presenter.show_result(&CaptureOutcome::Failure {
                        reason: FailureReason::AnswerService,
                        message: e.to_string(),
                    });
                    return;
                }
            };

            let inspector = Win32WindowInspector;
            let display = Win32DisplayInfo;
            let capture = GraphicsCapture;
            let engine = TesseractEngine;

            let pipeline = CapturePipeline::new(
                snapshot,
                &inspector,
                &display,
                &capture,
                &engine,
                &client,
                &presenter,
                &CAPTURE_BUSY,
            );
            pipeline.run();
        });
    }

    fn toggle_capture() {
        match store().lock() {
            Ok(mut guard) => match guard.toggle_enabled() {
                Ok(enabled) => log(&format!(
                    "Capture {}",
                    if enabled { "enabled" } else { "disabled" }
                )),
                Err(e) => log(&format!("Failed to persist settings: {}", e)),
            },
            Err(_) => log("Settings store poisoned, toggle ignored"),
        }
    }

    fn create_message_window() -> Result<HWND> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;
            let class_name = w!("TestHelperClass");

            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance.into(),
                lpszClassName: class_name,
                ..Default::default()
            };

            let atom = RegisterClassW(&wc);
            if atom == 0 {
                return Err(anyhow!("Failed to register window class"));
            }

            let hwnd = CreateWindowExW(
                Default::default(),
                class_name,
                w!("Test Helper"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                hinstance,
                None,
            )?;

            Ok(hwnd)
        }
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        unsafe {
            match msg {
                WM_HOTKEY => {
                    if wparam.0 as i32 == HOTKEY_CAPTURE {
                        trigger_capture();
                    }
                    LRESULT(0)
                }
                WM_TRAYICON => {
                    let event = (lparam.0 & 0xFFFF) as u32;
                    match event {
                        WM_RBUTTONUP => {
                            show_context_menu(hwnd);
                        }
                        WM_LBUTTONDBLCLK => {
                            trigger_capture();
                        }
                        _ => {}
                    }
                    LRESULT(0)
                }
                WM_COMMAND => {
                    let cmd = wparam.0 & 0xFFFF;
                    if cmd == MENU_TOGGLE {
                        toggle_capture();
                    } else if cmd == MENU_EXIT {
                        log("Exit requested");
                        PostQuitMessage(0);
                    }
                    LRESULT(0)
                }
                WM_DESTROY => {
                    PostQuitMessage(0);
                    LRESULT(0)
                }
                _ => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
    }

    fn add_tray_icon(hwnd: HWND) -> Result<()> {
        unsafe {
            let mut nid = NOTIFYICONDATAW {
                cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
                hWnd: hwnd,
                uID: 1,
                uFlags: NIF_ICON | NIF_MESSAGE | NIF_TIP,
                uCallbackMessage: WM_TRAYICON,
                hIcon: LoadIconW(None, IDI_APPLICATION)?,
                ..Default::default()
            };

            // Set tooltip
            let tip = "Test Helper (Ctrl+T)";
            let tip_wide: Vec<u16> = tip.encode_utf16().chain(std::iter::once(0)).collect();
            let len = tip_wide.len().min(nid.szTip.len());
            nid.szTip[..len].copy_from_slice(&tip_wide[..len]);

            if !Shell_NotifyIconW(NIM_ADD, &nid).as_bool() {
                return Err(anyhow!("Failed to add tray icon"));
            }

            Ok(())
        }
    }

    fn remove_tray_icon(hwnd: HWND) {
        unsafe {
            let nid = NOTIFYICONDATAW {
                cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
                hWnd: hwnd,
                uID: 1,
                ..Default::default()
            };
            let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
        }
    }

    fn show_context_menu(hwnd: HWND) {
        let enabled = store()
            .lock()
            .map(|guard| guard.get().app_enabled)
            .unwrap_or(true);

        unsafe {
            let Ok(menu) = CreatePopupMenu() else {
                return;
            };

            // Items inserted in reverse order since position 0
            let _ = InsertMenuW(menu, 0, MF_BYPOSITION | MF_STRING, MENU_EXIT, w!("Sair"));

            let _ = InsertMenuW(menu, 0, MF_BYPOSITION | MF_SEPARATOR, 0, None);

            let check = if enabled { MF_CHECKED } else { MF_UNCHECKED };
            let _ = InsertMenuW(
                menu,
                0,
                MF_BYPOSITION | MF_STRING | check,
                MENU_TOGGLE,
                w!("Captura ativada"),
            );

            let mut point = POINT::default();
            let _ = GetCursorPos(&mut point);

            // Required so the menu closes when focus is lost
            let _ = SetForegroundWindow(hwnd);

            let _ = TrackPopupMenu(
                menu,
                TPM_BOTTOMALIGN | TPM_LEFTALIGN | TPM_RIGHTBUTTON,
                point.x,
                point.y,
                0,
                hwnd,
                None,
            );

            let _ = DestroyMenu(menu);
        }
    }
}
