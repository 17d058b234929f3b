//! Window procedure: decodes raw window messages and routes them.
//!
//! Routing:
//! - Tray callback, left button up  → open menu if enabled for left click
//! - Tray callback, right button up → open menu if enabled for right click
//! - Menu command                   → item callback via the id index
//! - Close / destroy                → stop the pump
//!
//! Unknown messages, unknown ids and clicks on disabled or hidden items are
//! dropped silently. Only a callback returning `Err` ends the run.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::menu::MenuItem;
use crate::native::{
    WindowMessage, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_LBUTTONUP, WM_RBUTTONUP, WM_TRAY_CALLBACK,
    WM_TRAY_WAKE,
};
use crate::tray::Tray;

/// Mouse events reported for the notification icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayNotification {
    LeftClick,
    RightClick,
}

/// A window message the tray cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Tray(TrayNotification),
    Command(MenuItem),
    /// Another thread queued commands.
    Wake,
    Close,
    Destroyed,
}

/// What the pump should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Decode a raw message. Returns `None` for messages the tray ignores.
pub fn decode(message: &WindowMessage) -> Option<WindowEvent> {
    match message.msg {
        WM_TRAY_CALLBACK => {
            // The shell puts the mouse message in the low word of lparam.
            match (message.lparam as usize & 0xFFFF) as u32 {
                WM_LBUTTONUP => Some(WindowEvent::Tray(TrayNotification::LeftClick)),
                WM_RBUTTONUP => Some(WindowEvent::Tray(TrayNotification::RightClick)),
                _ => None,
            }
        }
        WM_COMMAND => MenuItem::from_command(message.wparam).map(WindowEvent::Command),
        WM_TRAY_WAKE => Some(WindowEvent::Wake),
        WM_CLOSE => Some(WindowEvent::Close),
        WM_DESTROY => Some(WindowEvent::Destroyed),
        _ => None,
    }
}

/// Handle one decoded event on the tray thread.
pub fn dispatch(tray: &mut Tray, event: WindowEvent) -> Result<Flow> {
    match event {
        WindowEvent::Tray(TrayNotification::LeftClick) => {
            if tray.opens_on_left_click() {
                open_menu(tray)?;
            }
        }
        WindowEvent::Tray(TrayNotification::RightClick) => {
            if tray.opens_on_right_click() {
                open_menu(tray)?;
            }
        }
        WindowEvent::Command(item) => tray.activate(item)?,
        WindowEvent::Wake => tray.drain_commands()?,
        WindowEvent::Close => {
            info!("window close requested");
            return Ok(Flow::Exit);
        }
        WindowEvent::Destroyed => {
            tray.forget_window();
            return Ok(Flow::Exit);
        }
    }
    Ok(Flow::Continue)
}

/// Decode and dispatch a raw message.
pub fn window_procedure(tray: &mut Tray, message: &WindowMessage) -> Result<Flow> {
    match decode(message) {
        Some(event) => dispatch(tray, event),
        None => Ok(Flow::Continue),
    }
}

/// Fire the tray-opened hook, then show the root menu at the cursor.
///
/// The popup call blocks until the menu closes, so the hook runs just
/// before it; whatever the hook changes is visible in the menu it opens.
/// No root menu means there is nothing to open and the hook stays quiet.
fn open_menu(tray: &mut Tray) -> Result<()> {
    let Some(root) = tray.menu().root_menu() else {
        return Ok(());
    };
    tray.fire_tray_opened()?;
    let native = tray.native_mut();
    let at = native.cursor_position();
    debug!(x = at.x, y = at.y, "opening tray menu");
    if let Err(e) = native.show_popup(root, at) {
        warn!(error = %e, "could not show tray menu");
    }
    Ok(())
}
