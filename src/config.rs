//! JSON configuration for a tray run.
//!
//! Every field is optional in the file; missing ones take their defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrayError};

pub const DEFAULT_WINDOW_CLASS: &str = "NotifyTrayWindow";

/// Settings applied before `on_ready` runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TrayConfig {
    /// Class name of the hidden message window.
    pub window_class: String,
    pub tooltip: Option<String>,
    pub icon_path: Option<PathBuf>,
    pub open_on_left_click: bool,
    pub open_on_right_click: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            window_class: DEFAULT_WINDOW_CLASS.to_string(),
            tooltip: None,
            icon_path: None,
            open_on_left_click: false,
            open_on_right_click: true,
        }
    }
}

impl TrayConfig {
    /// Load config from a JSON file, returning defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(TrayError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrayError::Config(e.to_string()))
    }
}
