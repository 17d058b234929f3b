//! Error types for the tray.
//!
//! Startup failures abort [`crate::run`] and are handed back to the caller.
//! Steady-state races (a command for an item that no longer exists, a click
//! on a disabled entry) are not errors at all and never reach this type.

use std::path::PathBuf;

use crate::menu::MenuItem;

/// Result alias used across the crate.
pub type Result<T, E = TrayError> = std::result::Result<T, E>;

/// Errors produced by the tray core and its native backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrayError {
    /// Window class, window, or menu object could not be created.
    #[error("failed to create native resource: {0}")]
    ResourceCreation(String),

    /// The shell rejected an add/modify/delete of the notification icon.
    #[error("shell rejected the notification icon: {0}")]
    ShellRegistration(String),

    /// An icon or bitmap could not be decoded or converted.
    #[error("failed to load image '{}': {reason}", path.display())]
    ResourceLoad { path: PathBuf, reason: String },

    /// The item handle was issued before a menu reset.
    #[error("{0} no longer exists")]
    StaleReference(MenuItem),

    /// A callback asked to terminate the run.
    #[error("run aborted: {0}")]
    Aborted(String),

    /// The tray thread has already finished.
    #[error("tray thread is no longer running")]
    Disconnected,

    /// A blocking cross-thread call was issued from the tray thread itself.
    #[error("blocking tray call issued from the tray thread")]
    WrongThread,

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TrayError {
    /// Build the error a callback returns to stop the run.
    pub fn abort(reason: impl Into<String>) -> Self {
        TrayError::Aborted(reason.into())
    }
}
