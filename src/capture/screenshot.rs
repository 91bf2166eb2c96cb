//! Window-source capture.
//!
//! Produces thumbnails of capturable windows, analogous to a desktop
//! capturer: callers get (name, thumbnail) pairs and pick the one matching
//! the foreground window title. The Windows backend uses the Windows
//! Graphics Capture API with a D3D11 staging texture for CPU readback.

use anyhow::Result;
use image::{ImageBuffer, Rgba};

/// Requested thumbnail size, in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// A capturable window and its thumbnail.
pub struct WindowSource {
    pub name: String,
    pub thumbnail: ImageBuffer<Rgba<u8>, Vec<u8>>,
}

/// Enumerates capturable windows.
pub trait ScreenCapture {
    /// Lists visible titled windows with thumbnails close to `target` size.
    /// Windows that cannot be captured are silently skipped.
    fn list_window_sources(&self, target: PixelSize) -> Result<Vec<WindowSource>>;
}

#[cfg(windows)]
pub use win32::GraphicsCapture;

#[cfg(windows)]
mod win32 {
    use super::*;
    use anyhow::{anyhow, Context};

    use windows::core::Interface;
    use windows::Foundation::TypedEventHandler;
    use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem};
    use windows::Graphics::DirectX::DirectXPixelFormat;
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
    use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
    use windows::Win32::Graphics::Direct3D11::{
        D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
        D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ,
        D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
    };
    use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;
    use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
    use windows::Win32::UI::WindowsAndMessaging::{EnumWindows, IsIconic, IsWindowVisible};

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::capture::window::win32_window_title;

    pub struct GraphicsCapture;

    impl ScreenCapture for GraphicsCapture {
        fn list_window_sources(&self, target: PixelSize) -> Result<Vec<WindowSource>> {
            let mut sources = Vec::new();

            for hwnd in enumerate_visible_windows() {
                let name = win32_window_title(hwnd);
                if name.is_empty() {
                    continue;
                }

                match capture_window_thumbnail(hwnd, target) {
                    Ok(thumbnail) => sources.push(WindowSource { name, thumbnail }),
                    Err(e) => {
                        // Protected windows (UAC prompts etc.) refuse capture
                        crate::log(&format!("Skipping window \"{}\": {}", name, e));
                    }
                }
            }

            Ok(sources)
        }
    }

    /// Enumerates visible, non-minimized top-level windows.
    fn enumerate_visible_windows() -> Vec<HWND> {
        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let windows = &mut *(lparam.0 as *mut Vec<HWND>);
                if IsWindowVisible(hwnd).as_bool() && !IsIconic(hwnd).as_bool() {
                    windows.push(hwnd);
                }
                TRUE
            }
        }

        let mut windows: Vec<HWND> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(enum_callback),
                LPARAM(&mut windows as *mut _ as isize),
            );
        }
        windows
    }

    /// Captures one frame of a window and resizes it to the target size.
    pub fn capture_window_thumbnail(
        hwnd: HWND,
        target: PixelSize,
    ) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>> {
        let img = capture_window_frame(hwnd)?;

        if target.width == 0 || target.height == 0 {
            return Ok(img);
        }
        if img.dimensions() == (target.width, target.height) {
            return Ok(img);
        }
        Ok(image::imageops::resize(
            &img,
            target.width,
            target.height,
            image::imageops::FilterType::Triangle,
        ))
    }

    /// Captures a single BGRA frame of the window and converts it to RGBA.
    fn capture_window_frame(hwnd: HWND) -> Result<ImageBuffer<Rgba<u8>, Vec<u8>>> {
        let (device, context) = create_d3d11_device()?;
        let item = create_capture_item(hwnd)?;
        let size = item.Size()?;
        if size.Width <= 0 || size.Height <= 0 {
            return Err(anyhow!("Window has no capturable surface"));
        }

        let d3d_device = create_direct3d_device(&device)?;
        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &d3d_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        let frame_arrived = Arc::new(AtomicBool::new(false));
        let frame_arrived_clone = frame_arrived.clone();
        frame_pool.FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                frame_arrived_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        session.StartCapture()?;

        let start = std::time::Instant::now();
        while !frame_arrived.load(Ordering::SeqCst) {
            if start.elapsed().as_secs() > 5 {
                session.Close()?;
                frame_pool.Close()?;
                return Err(anyhow!("Timeout waiting for capture frame"));
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let frame = frame_pool.TryGetNextFrame()?;
        let surface = frame.Surface()?;

        let access: windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess =
            surface.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };

        let staging_texture = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            device.CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| anyhow!("Failed to create staging texture"))?
        };

        unsafe {
            context.CopyResource(
                &staging_texture.cast::<ID3D11Resource>()?,
                &texture.cast::<ID3D11Resource>()?,
            );
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            context.Map(
                &staging_texture.cast::<ID3D11Resource>()?,
                0,
                D3D11_MAP_READ,
                0,
                Some(&mut mapped),
            )?;
            mapped
        };

        let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(desc.Width, desc.Height);

        let src_data = unsafe {
            std::slice::from_raw_parts(
                mapped.pData as *const u8,
                (mapped.RowPitch * desc.Height) as usize,
            )
        };
        let row_pitch = mapped.RowPitch as usize;

        for y in 0..desc.Height {
            for x in 0..desc.Width {
                let offset = y as usize * row_pitch + x as usize * 4;
                // BGRA -> RGBA
                let b = src_data[offset];
                let g = src_data[offset + 1];
                let r = src_data[offset + 2];
                let a = src_data[offset + 3];
                img.put_pixel(x, y, Rgba([r, g, b, a]));
            }
        }

        unsafe {
            context.Unmap(&staging_texture.cast::<ID3D11Resource>()?, 0);
        }

        session.Close()?;
        frame_pool.Close()?;

        Ok(img)
    }

    fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
        let mut device: Option<ID3D11Device> = None;
        let mut context: Option<ID3D11DeviceContext> = None;

        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                None,
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )?;
        }

        Ok((
            device.ok_or_else(|| anyhow!("Failed to create D3D11 device"))?,
            context.ok_or_else(|| anyhow!("Failed to create D3D11 context"))?,
        ))
    }

    fn create_direct3d_device(
        device: &ID3D11Device,
    ) -> Result<windows::Graphics::DirectX::Direct3D11::IDirect3DDevice> {
        let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
        let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
        inspectable
            .cast()
            .context("Failed to cast to IDirect3DDevice")
    }

    fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
        let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
        let interop: IGraphicsCaptureItemInterop = unsafe {
            windows::Win32::System::WinRT::RoGetActivationFactory(class_name)
                .context("Failed to get IGraphicsCaptureItemInterop")?
        };
        unsafe {
            interop
                .CreateForWindow(hwnd)
                .context("Failed to create capture item for window")
        }
    }
}
