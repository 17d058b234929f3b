//! Win32 implementation of [`Native`].

use std::ffi::c_void;
use std::path::Path;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use windows::core::{w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::{DeleteObject, HBITMAP};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreatePopupMenu, CreateWindowExW, DestroyIcon, DestroyMenu, DestroyWindow, DispatchMessageW,
    GetCursorPos, GetMessageW, InsertMenuItemW, PostMessageW, PostQuitMessage, RegisterClassExW,
    RemoveMenu, SetForegroundWindow, SetMenuItemInfoW, TrackPopupMenu, TranslateMessage,
    UnregisterClassW, HICON, HMENU, HWND_MESSAGE, MENUITEMINFOW, MENU_ITEM_STATE, MF_BYPOSITION,
    MFS_CHECKED, MFS_DISABLED, MFT_SEPARATOR, MFT_STRING, MIIM_BITMAP, MIIM_FTYPE, MIIM_ID,
    MIIM_STATE, MIIM_STRING, MIIM_SUBMENU, MSG, TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RIGHTBUTTON,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_NULL, WNDCLASSEXW,
};

use super::{bitmap, wndproc};
use crate::error::{Result, TrayError};
use crate::handle::{BitmapHandle, IconHandle, MenuHandle, WindowHandle};
use crate::native::{
    Native, NativeItem, NativeItemKind, NotifyData, NotifyOp, Point, Waker, WindowMessage,
    TRAY_ICON_ID, WM_TRAY_CALLBACK, WM_TRAY_WAKE,
};

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error(call: &str) -> String {
    let code = unsafe { GetLastError() };
    format!("{} failed (error {})", call, code.0)
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut c_void)
}

fn hmenu(menu: MenuHandle) -> HMENU {
    HMENU(menu.0 as *mut c_void)
}

fn hicon(icon: IconHandle) -> HICON {
    HICON(icon.0 as *mut c_void)
}

fn hbitmap(bitmap: BitmapHandle) -> HBITMAP {
    HBITMAP(bitmap.0 as *mut c_void)
}

/// Fill a `MENUITEMINFOW` for `item` and hand it to `apply`. The title
/// buffer lives until `apply` returns.
fn with_item_info<R>(item: &NativeItem, apply: impl FnOnce(&MENUITEMINFOW) -> R) -> R {
    let mut title = wide(&item.title);
    let mut info = MENUITEMINFOW {
        cbSize: std::mem::size_of::<MENUITEMINFOW>() as u32,
        ..Default::default()
    };
    match item.kind {
        NativeItemKind::Separator => {
            info.fMask = MIIM_FTYPE;
            info.fType = MFT_SEPARATOR;
        }
        NativeItemKind::String => {
            let mut state = MENU_ITEM_STATE::default();
            if item.disabled {
                state = state | MFS_DISABLED;
            }
            if item.checked {
                state = state | MFS_CHECKED;
            }
            info.fMask = MIIM_FTYPE | MIIM_STATE | MIIM_ID | MIIM_SUBMENU | MIIM_BITMAP | MIIM_STRING;
            info.fType = MFT_STRING;
            info.fState = state;
            info.wID = item.id;
            info.hSubMenu = item.submenu.map(hmenu).unwrap_or_default();
            info.hbmpItem = item.bitmap.map(hbitmap).unwrap_or_default();
            info.cch = (title.len() - 1) as u32;
            info.dwTypeData = PWSTR(title.as_mut_ptr());
        }
    }
    apply(&info)
}

/// The real notification area, popup menus and message queue.
///
/// Create it on the thread that will run the tray: the window and its
/// message queue belong to that thread.
pub struct Win32Shell {
    instance: HINSTANCE,
    class_name: Vec<u16>,
    /// Raw `HWND` shared with wakers on other threads; 0 while no window exists.
    window: Arc<AtomicIsize>,
    quitting: bool,
    finished: bool,
}

impl Win32Shell {
    pub fn new() -> Result<Self> {
        let module = unsafe { GetModuleHandleW(None) }
            .map_err(|e| TrayError::ResourceCreation(format!("GetModuleHandleW: {}", e)))?;
        Ok(Self {
            instance: module.into(),
            class_name: Vec::new(),
            window: Arc::new(AtomicIsize::new(0)),
            quitting: false,
            finished: false,
        })
    }

    fn current_window(&self) -> HWND {
        HWND(self.window.load(Ordering::Acquire) as *mut c_void)
    }
}

impl Native for Win32Shell {
    fn register_class(&mut self, class_name: &str) -> Result<()> {
        self.class_name = wide(class_name);
        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(wndproc::window_proc),
            hInstance: self.instance,
            lpszClassName: PCWSTR(self.class_name.as_ptr()),
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&class) } == 0 {
            return Err(TrayError::ResourceCreation(last_error("RegisterClassExW")));
        }
        Ok(())
    }

    fn unregister_class(&mut self) -> Result<()> {
        unsafe { UnregisterClassW(PCWSTR(self.class_name.as_ptr()), Some(self.instance)) }
            .map_err(|e| TrayError::ResourceCreation(format!("UnregisterClassW: {}", e)))
    }

    fn create_window(&mut self) -> Result<WindowHandle> {
        let window = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(self.class_name.as_ptr()),
                w!("notify-tray"),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                Some(HWND_MESSAGE),
                None,
                Some(self.instance),
                None,
            )
        }
        .map_err(|e| TrayError::ResourceCreation(format!("CreateWindowExW: {}", e)))?;
        self.window.store(window.0 as isize, Ordering::Release);
        Ok(WindowHandle(window.0 as usize))
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<()> {
        self.window.store(0, Ordering::Release);
        let destroyed = unsafe { DestroyWindow(hwnd(window)) };
        // WM_DESTROY from our own teardown is not news to anyone.
        wndproc::clear_pending();
        destroyed.map_err(|e| TrayError::ResourceCreation(format!("DestroyWindow: {}", e)))
    }

    fn create_menu(&mut self) -> Result<MenuHandle> {
        let menu = unsafe { CreatePopupMenu() }
            .map_err(|e| TrayError::ResourceCreation(format!("CreatePopupMenu: {}", e)))?;
        Ok(MenuHandle(menu.0 as usize))
    }

    fn destroy_menu(&mut self, menu: MenuHandle) -> Result<()> {
        unsafe { DestroyMenu(hmenu(menu)) }
            .map_err(|e| TrayError::ResourceCreation(format!("DestroyMenu: {}", e)))
    }

    fn insert_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()> {
        with_item_info(item, |info| unsafe { InsertMenuItemW(hmenu(menu), position, true, info) })
            .map_err(|e| TrayError::ResourceCreation(format!("InsertMenuItemW: {}", e)))
    }

    fn update_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()> {
        with_item_info(item, |info| unsafe { SetMenuItemInfoW(hmenu(menu), position, true, info) })
            .map_err(|e| TrayError::ResourceCreation(format!("SetMenuItemInfoW: {}", e)))
    }

    fn remove_item(&mut self, menu: MenuHandle, position: u32) -> Result<()> {
        unsafe { RemoveMenu(hmenu(menu), position, MF_BYPOSITION) }
            .map_err(|e| TrayError::ResourceCreation(format!("RemoveMenu: {}", e)))
    }

    fn notify_icon(&mut self, op: NotifyOp, data: &NotifyData) -> Result<()> {
        let mut record = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: self.current_window(),
            uID: TRAY_ICON_ID,
            uFlags: NIF_MESSAGE | NIF_ICON | NIF_TIP,
            uCallbackMessage: WM_TRAY_CALLBACK,
            hIcon: data.icon.map(hicon).unwrap_or_default(),
            ..Default::default()
        };
        // Already truncated; the last slot stays NUL.
        for (slot, unit) in record.szTip.iter_mut().zip(data.tooltip.encode_utf16()) {
            *slot = unit;
        }

        let message = match op {
            NotifyOp::Add => NIM_ADD,
            NotifyOp::Modify => NIM_MODIFY,
            NotifyOp::Delete => NIM_DELETE,
        };
        if unsafe { Shell_NotifyIconW(message, &record) }.as_bool() {
            Ok(())
        } else {
            Err(TrayError::ShellRegistration(last_error(&format!(
                "Shell_NotifyIconW({:?})",
                op
            ))))
        }
    }

    fn load_icon(&mut self, path: &Path) -> Result<IconHandle> {
        let icon = bitmap::load_icon(path)?;
        debug!(path = %path.display(), "icon loaded");
        Ok(IconHandle(icon.0 as usize))
    }

    fn load_bitmap(&mut self, path: &Path) -> Result<BitmapHandle> {
        let bitmap = bitmap::load_menu_bitmap(path)?;
        Ok(BitmapHandle(bitmap.0 as usize))
    }

    fn destroy_icon(&mut self, icon: IconHandle) {
        if let Err(e) = unsafe { DestroyIcon(hicon(icon)) } {
            warn!(%icon, error = %e, "DestroyIcon failed");
        }
    }

    fn destroy_bitmap(&mut self, bitmap: BitmapHandle) {
        if !unsafe { DeleteObject(hbitmap(bitmap).into()) }.as_bool() {
            warn!(%bitmap, "DeleteObject failed");
        }
    }

    fn cursor_position(&mut self) -> Point {
        let mut point = POINT::default();
        if let Err(e) = unsafe { GetCursorPos(&mut point) } {
            warn!(error = %e, "GetCursorPos failed");
        }
        Point {
            x: point.x,
            y: point.y,
        }
    }

    fn show_popup(&mut self, menu: MenuHandle, at: Point) -> Result<()> {
        let window = self.current_window();
        unsafe {
            // Message-only windows cannot take the foreground, so this
            // usually fails and a click outside the popup may not dismiss
            // it; Escape or a second tray click still does.
            let _ = SetForegroundWindow(window);
            let shown = TrackPopupMenu(
                hmenu(menu),
                TPM_BOTTOMALIGN | TPM_LEFTALIGN | TPM_RIGHTBUTTON,
                at.x,
                at.y,
                None,
                window,
                None,
            );
            // Lets the next tray click open the menu again (KB135788)
            let _ = PostMessageW(Some(window), WM_NULL, WPARAM(0), LPARAM(0));
            if !shown.as_bool() {
                return Err(TrayError::ResourceCreation(last_error("TrackPopupMenu")));
            }
        }
        Ok(())
    }

    fn next_message(&mut self) -> Option<WindowMessage> {
        if self.finished {
            return None;
        }
        loop {
            if self.quitting {
                wndproc::clear_pending();
            } else if let Some(message) = wndproc::take_pending() {
                return Some(message);
            }

            let mut msg = MSG::default();
            let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
            match status.0 {
                0 => {
                    self.finished = true;
                    return None;
                }
                -1 => {
                    warn!(error = %last_error("GetMessageW"), "message pump failed");
                    self.finished = true;
                    return None;
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        }
    }

    fn post_quit(&mut self) {
        self.quitting = true;
        unsafe { PostQuitMessage(0) };
    }

    fn waker(&self) -> Waker {
        let window = Arc::clone(&self.window);
        Arc::new(move || {
            let raw = window.load(Ordering::Acquire);
            // Before the window exists the pump drains the bus on its own.
            if raw != 0 {
                let target = HWND(raw as *mut c_void);
                let _ = unsafe { PostMessageW(Some(target), WM_TRAY_WAKE, WPARAM(0), LPARAM(0)) };
            }
        })
    }
}
