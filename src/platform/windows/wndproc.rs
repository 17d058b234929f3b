//! The window procedure registered with the tray's window class.
//!
//! Tray callbacks can do anything, including panicking, so they never run
//! inside this `extern "system"` function. It only records the messages the
//! core cares about; the pump hands them out after `DispatchMessageW`
//! returns.

use std::cell::RefCell;
use std::collections::VecDeque;

use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::DefWindowProcW;

use crate::native::{WindowMessage, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_TRAY_CALLBACK, WM_TRAY_WAKE};

thread_local! {
    static PENDING: RefCell<VecDeque<WindowMessage>> = const { RefCell::new(VecDeque::new()) };
}

pub(super) extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        // WM_CLOSE is swallowed so the window survives until teardown.
        WM_TRAY_CALLBACK | WM_COMMAND | WM_TRAY_WAKE | WM_CLOSE | WM_DESTROY => {
            PENDING.with(|pending| {
                pending
                    .borrow_mut()
                    .push_back(WindowMessage::new(msg, wparam.0, lparam.0))
            });
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

pub(super) fn take_pending() -> Option<WindowMessage> {
    PENDING.with(|pending| pending.borrow_mut().pop_front())
}

pub(super) fn clear_pending() {
    PENDING.with(|pending| pending.borrow_mut().clear());
}
