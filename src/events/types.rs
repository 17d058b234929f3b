//! Typed mutation requests marshaled onto the tray thread.
//!
//! Native menu and icon handles may only be touched from the thread that
//! owns the window. Other threads describe what they want with a
//! [`TrayCommand`] and the pump applies it between messages.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use crate::error::Result;
use crate::menu::MenuItem;
use crate::tray::Tray;

/// Work item that runs on the tray thread with full access to the tray.
pub type TrayJob = Box<dyn FnOnce(&mut Tray) -> Result<()> + Send>;

/// A request queued by another thread.
pub enum TrayCommand {
    // === Item state ===
    SetTitle(MenuItem, String),
    SetEnabled(MenuItem, bool),
    SetChecked(MenuItem, bool),
    SetVisible(MenuItem, bool),
    SetItemIcon(MenuItem, PathBuf),

    // === Notification icon ===
    SetIcon(PathBuf),
    SetTooltip(String),
    SetOpenOnLeftClick(bool),
    SetOpenOnRightClick(bool),

    // === Structure ===
    /// Add an item and report the new handle (or the failure) back.
    AddMenuItem {
        parent: Option<MenuItem>,
        title: String,
        reply: Sender<Result<MenuItem>>,
    },
    AddSeparator,
    ResetMenu,

    // === Lifecycle ===
    Quit,
    /// Run arbitrary code on the tray thread. An error ends the run.
    Invoke(TrayJob),
}

impl TrayCommand {
    /// Returns a human-readable description of the command for logging.
    pub fn description(&self) -> &'static str {
        match self {
            TrayCommand::SetTitle(..) => "set item title",
            TrayCommand::SetEnabled(..) => "enable/disable item",
            TrayCommand::SetChecked(..) => "check/uncheck item",
            TrayCommand::SetVisible(..) => "show/hide item",
            TrayCommand::SetItemIcon(..) => "set item icon",
            TrayCommand::SetIcon(_) => "set tray icon",
            TrayCommand::SetTooltip(_) => "set tooltip",
            TrayCommand::SetOpenOnLeftClick(_) => "set open on left click",
            TrayCommand::SetOpenOnRightClick(_) => "set open on right click",
            TrayCommand::AddMenuItem { .. } => "add menu item",
            TrayCommand::AddSeparator => "add separator",
            TrayCommand::ResetMenu => "reset menu",
            TrayCommand::Quit => "quit",
            TrayCommand::Invoke(_) => "invoke closure",
        }
    }
}

impl fmt::Debug for TrayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrayCommand::SetTitle(item, title) => write!(f, "SetTitle({item}, {title:?})"),
            TrayCommand::SetEnabled(item, on) => write!(f, "SetEnabled({item}, {on})"),
            TrayCommand::SetChecked(item, on) => write!(f, "SetChecked({item}, {on})"),
            TrayCommand::SetVisible(item, on) => write!(f, "SetVisible({item}, {on})"),
            TrayCommand::SetItemIcon(item, path) => write!(f, "SetItemIcon({item}, {})", path.display()),
            TrayCommand::SetIcon(path) => write!(f, "SetIcon({})", path.display()),
            TrayCommand::SetTooltip(text) => write!(f, "SetTooltip({text:?})"),
            TrayCommand::SetOpenOnLeftClick(on) => write!(f, "SetOpenOnLeftClick({on})"),
            TrayCommand::SetOpenOnRightClick(on) => write!(f, "SetOpenOnRightClick({on})"),
            TrayCommand::AddMenuItem { parent, title, .. } => {
                write!(f, "AddMenuItem({parent:?}, {title:?})")
            }
            TrayCommand::AddSeparator => f.write_str("AddSeparator"),
            TrayCommand::ResetMenu => f.write_str("ResetMenu"),
            TrayCommand::Quit => f.write_str("Quit"),
            TrayCommand::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}
