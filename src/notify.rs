//! Lifecycle of the single notification-area icon.
//!
//! ```text
//!   NotInstalled ──install──▶ Installed ──uninstall──▶ Removed
//!        │                      │    ▲
//!        └ set_icon/tooltip     └────┘ set_icon/tooltip (NIM_MODIFY)
//!          (recorded only)
//! ```
//!
//! Attributes set before installation are remembered and sent with the add.
//! Re-adding after removal is refused.

use tracing::{debug, info};

use crate::error::{Result, TrayError};
use crate::handle::IconHandle;
use crate::native::{Native, NotifyData, NotifyOp, TOOLTIP_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconLifecycle {
    NotInstalled,
    Installed,
    Removed,
}

/// Truncate `text` to the shell's tooltip capacity in UTF-16 units,
/// never splitting a surrogate pair.
pub fn truncate_tooltip(text: &str) -> String {
    let mut units = 0;
    let mut end = 0;
    for (offset, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if units + width > TOOLTIP_CAPACITY {
            break;
        }
        units += width;
        end = offset + ch.len_utf8();
    }
    text[..end].to_owned()
}

#[derive(Debug)]
pub struct NotifyIcon {
    icon: Option<IconHandle>,
    tooltip: String,
    lifecycle: IconLifecycle,
}

impl Default for NotifyIcon {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyIcon {
    pub fn new() -> Self {
        Self {
            icon: None,
            tooltip: String::new(),
            lifecycle: IconLifecycle::NotInstalled,
        }
    }

    pub fn lifecycle(&self) -> IconLifecycle {
        self.lifecycle
    }

    pub fn is_installed(&self) -> bool {
        self.lifecycle == IconLifecycle::Installed
    }

    pub fn icon(&self) -> Option<IconHandle> {
        self.icon
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }

    fn data(&self) -> NotifyData {
        NotifyData {
            icon: self.icon,
            tooltip: self.tooltip.clone(),
        }
    }

    /// Register the icon with the shell.
    pub fn install(&mut self, native: &mut dyn Native) -> Result<()> {
        match self.lifecycle {
            IconLifecycle::Installed => Ok(()),
            IconLifecycle::Removed => Err(TrayError::ShellRegistration(
                "notification icon cannot be re-added after removal".into(),
            )),
            IconLifecycle::NotInstalled => {
                native.notify_icon(NotifyOp::Add, &self.data())?;
                self.lifecycle = IconLifecycle::Installed;
                info!(tooltip = %self.tooltip, "notification icon installed");
                Ok(())
            }
        }
    }

    /// Swap the displayed icon. Returns the icon that is no longer shown.
    ///
    /// If the shell rejects the change the previous icon stays current and
    /// the error is returned; the caller still owns `icon`.
    pub fn set_icon(&mut self, native: &mut dyn Native, icon: IconHandle) -> Result<Option<IconHandle>> {
        let previous = self.icon.replace(icon);
        if self.is_installed() {
            if let Err(e) = native.notify_icon(NotifyOp::Modify, &self.data()) {
                self.icon = previous;
                return Err(e);
            }
        }
        Ok(previous)
    }

    pub fn set_tooltip(&mut self, native: &mut dyn Native, text: &str) -> Result<()> {
        let tooltip = truncate_tooltip(text);
        if tooltip.len() < text.len() {
            debug!(kept = tooltip.len(), dropped = text.len() - tooltip.len(), "tooltip truncated");
        }
        self.tooltip = tooltip;
        if self.is_installed() {
            native.notify_icon(NotifyOp::Modify, &self.data())?;
        }
        Ok(())
    }

    /// Remove the icon. A no-op unless it is currently installed.
    pub fn uninstall(&mut self, native: &mut dyn Native) -> Result<()> {
        if !self.is_installed() {
            return Ok(());
        }
        self.lifecycle = IconLifecycle::Removed;
        native.notify_icon(NotifyOp::Delete, &self.data())?;
        info!("notification icon removed");
        Ok(())
    }
}
