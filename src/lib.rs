//! A single notification-area icon with a tooltip and a nested context menu.
//!
//! The core (menu tree, icon lifecycle, dispatcher, run loop) is platform
//! neutral and talks to the OS through [`native::Native`]. The Windows
//! backend lives in `platform::windows`; [`testing::MockNative`] runs the
//! same core headless, which is what the tests use.
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> notify_tray::Result<()> {
//! use notify_tray::platform::windows::Win32Shell;
//!
//! notify_tray::run(
//!     Win32Shell::new()?,
//!     |tray| {
//!         tray.set_tooltip("Hello")?;
//!         let quit = tray.add_menu_item("Quit")?;
//!         tray.set_callback(quit, |tray| {
//!             tray.quit();
//!             Ok(())
//!         });
//!         Ok(())
//!     },
//!     |_| {},
//! )
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handle;
pub mod menu;
pub mod native;
pub mod notify;
pub mod platform;
pub mod run;
pub mod testing;
pub mod tray;

// Re-export the application-facing API
pub use config::TrayConfig;
pub use error::{Result, TrayError};
pub use events::TrayHandle;
pub use menu::{ItemKind, ItemState, MenuItem, MenuTree};
pub use run::{run, run_with_config, spawn};
pub use tray::{Callback, Tray};
