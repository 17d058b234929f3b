//! The seam between the platform-neutral core and the operating system.
//!
//! The core never touches OS handles directly. It describes what it wants
//! (a menu entry, a notification-icon record, a popup at a point) with the
//! plain records below and hands them to a [`Native`] implementation:
//! `platform::windows::Win32Shell` on Windows, [`crate::testing::MockNative`]
//! everywhere else.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::handle::{BitmapHandle, IconHandle, MenuHandle, WindowHandle};

// Raw message numbers. These match the Win32 values so the Windows backend
// can forward messages untouched.
pub const WM_DESTROY: u32 = 0x0002;
pub const WM_CLOSE: u32 = 0x0010;
pub const WM_COMMAND: u32 = 0x0111;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_APP: u32 = 0x8000;

/// Callback message the shell sends for notification-icon events.
pub const WM_TRAY_CALLBACK: u32 = WM_APP + 1;

/// Private message posted by other threads after queueing a command.
pub const WM_TRAY_WAKE: u32 = WM_APP + 2;

/// Notification-icon identifier within our window (single icon model).
pub const TRAY_ICON_ID: u32 = 1;

/// Usable UTF-16 units in the shell's tooltip buffer (128 minus the NUL).
pub const TOOLTIP_CAPACITY: usize = 127;

/// Wakes the UI thread's pump from any thread.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A message retrieved by the pump, before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl WindowMessage {
    pub fn new(msg: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            msg,
            wparam,
            lparam,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeItemKind {
    String,
    Separator,
}

/// Everything needed to insert or refresh one native menu entry.
///
/// Mirrors the fields of the OS menu-item record: type, state flags,
/// command id, submenu, bitmap and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeItem {
    /// Command id; 0 for separators.
    pub id: u32,
    pub kind: NativeItemKind,
    pub title: String,
    pub disabled: bool,
    pub checked: bool,
    pub submenu: Option<MenuHandle>,
    pub bitmap: Option<BitmapHandle>,
}

impl NativeItem {
    pub fn separator() -> Self {
        Self {
            id: 0,
            kind: NativeItemKind::Separator,
            title: String::new(),
            disabled: false,
            checked: false,
            submenu: None,
            bitmap: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOp {
    Add,
    Modify,
    Delete,
}

/// The notification-icon record sent to the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyData {
    pub icon: Option<IconHandle>,
    /// Already truncated to [`TOOLTIP_CAPACITY`] UTF-16 units.
    pub tooltip: String,
}

/// Native services consumed by the tray core.
///
/// All methods are called on the UI thread only. Menu entries are addressed
/// by position within their menu; the core keeps positions consistent with
/// its own tree.
pub trait Native {
    fn register_class(&mut self, class_name: &str) -> Result<()>;
    fn unregister_class(&mut self) -> Result<()>;

    /// Create the message-only window that receives tray and menu messages.
    fn create_window(&mut self) -> Result<WindowHandle>;
    fn destroy_window(&mut self, window: WindowHandle) -> Result<()>;

    fn create_menu(&mut self) -> Result<MenuHandle>;
    /// Destroys the menu and every submenu attached to it.
    fn destroy_menu(&mut self, menu: MenuHandle) -> Result<()>;
    fn insert_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()>;
    fn update_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()>;
    /// Detaches the entry without destroying its submenu.
    fn remove_item(&mut self, menu: MenuHandle, position: u32) -> Result<()>;

    fn notify_icon(&mut self, op: NotifyOp, data: &NotifyData) -> Result<()>;

    fn load_icon(&mut self, path: &Path) -> Result<IconHandle>;
    fn load_bitmap(&mut self, path: &Path) -> Result<BitmapHandle>;
    fn destroy_icon(&mut self, icon: IconHandle);
    fn destroy_bitmap(&mut self, bitmap: BitmapHandle);

    fn cursor_position(&mut self) -> Point;
    fn show_popup(&mut self, menu: MenuHandle, at: Point) -> Result<()>;

    /// Block until the next message for our window. `None` once quit was posted.
    fn next_message(&mut self) -> Option<WindowMessage>;
    fn post_quit(&mut self);

    /// A thread-safe way to interrupt `next_message` from elsewhere.
    fn waker(&self) -> Waker;
}
