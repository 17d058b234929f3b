//! Image files to `HICON` (notification area) and `HBITMAP` (menu items).
//!
//! Files are decoded with the `image` crate and scaled to the size the shell
//! draws them at, then copied into a 32-bit top-down DIB section.

use std::ffi::c_void;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use windows::Win32::Foundation::GetLastError;
use windows::Win32::Graphics::Gdi::{
    CreateBitmap, CreateDIBSection, DeleteObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HBITMAP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateIconIndirect, GetSystemMetrics, HICON, ICONINFO, SM_CXMENUCHECK, SM_CXSMICON,
    SM_CYMENUCHECK, SM_CYSMICON, SYSTEM_METRICS_INDEX,
};

use crate::error::{Result, TrayError};

const FALLBACK_SIZE: u32 = 16;

fn load_error(path: &Path, reason: impl Into<String>) -> TrayError {
    TrayError::ResourceLoad {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn metric(index: SYSTEM_METRICS_INDEX) -> u32 {
    match unsafe { GetSystemMetrics(index) } {
        value if value > 0 => value as u32,
        _ => FALLBACK_SIZE,
    }
}

fn decode(path: &Path, width: u32, height: u32) -> Result<RgbaImage> {
    let image = image::open(path)
        .map_err(|e| load_error(path, e.to_string()))?
        .into_rgba8();
    if image.dimensions() == (width, height) {
        Ok(image)
    } else {
        Ok(imageops::resize(&image, width, height, FilterType::Lanczos3))
    }
}

/// Copy `image` into a new BGRA DIB section. Menu bitmaps need
/// premultiplied alpha; icon color planes do not.
fn dib_section(path: &Path, image: &RgbaImage, premultiply: bool) -> Result<HBITMAP> {
    let (width, height) = image.dimensions();
    let info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32), // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bits: *mut c_void = std::ptr::null_mut();
    let bitmap = unsafe { CreateDIBSection(None, &info, DIB_RGB_COLORS, &mut bits, None, 0) }
        .map_err(|e| load_error(path, format!("CreateDIBSection: {}", e)))?;
    if bits.is_null() {
        unsafe {
            let _ = DeleteObject(bitmap.into());
        }
        return Err(load_error(path, "CreateDIBSection returned no pixels"));
    }

    let len = (width * height * 4) as usize;
    let pixels = unsafe { std::slice::from_raw_parts_mut(bits as *mut u8, len) };
    for (dst, src) in pixels.chunks_exact_mut(4).zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        let scale = |c: u8| {
            if premultiply {
                ((u16::from(c) * u16::from(a) + 127) / 255) as u8
            } else {
                c
            }
        };
        dst.copy_from_slice(&[scale(b), scale(g), scale(r), a]);
    }
    Ok(bitmap)
}

/// Load an image file as a small notification-area icon.
pub(super) fn load_icon(path: &Path) -> Result<HICON> {
    let (width, height) = (metric(SM_CXSMICON), metric(SM_CYSMICON));
    let image = decode(path, width, height)?;
    let color = dib_section(path, &image, false)?;

    // The alpha channel of the color plane wins; the mask only has to exist.
    let stride = width.div_ceil(16) * 2;
    let mask_bits = vec![0u8; (stride * height) as usize];
    let mask = unsafe {
        CreateBitmap(
            width as i32,
            height as i32,
            1,
            1,
            Some(mask_bits.as_ptr() as *const c_void),
        )
    };
    if mask.is_invalid() {
        let code = unsafe { GetLastError() };
        unsafe {
            let _ = DeleteObject(color.into());
        }
        return Err(load_error(path, format!("CreateBitmap failed (error {})", code.0)));
    }

    let info = ICONINFO {
        fIcon: true.into(),
        xHotspot: 0,
        yHotspot: 0,
        hbmMask: mask,
        hbmColor: color,
    };
    let icon = unsafe { CreateIconIndirect(&info) };

    // The icon keeps its own copies of both planes.
    unsafe {
        let _ = DeleteObject(mask.into());
        let _ = DeleteObject(color.into());
    }
    icon.map_err(|e| load_error(path, format!("CreateIconIndirect: {}", e)))
}

/// Load an image file as a bitmap sized for a menu entry.
pub(super) fn load_menu_bitmap(path: &Path) -> Result<HBITMAP> {
    let (width, height) = (metric(SM_CXMENUCHECK), metric(SM_CYMENUCHECK));
    let image = decode(path, width, height)?;
    dib_section(path, &image, true)
}
