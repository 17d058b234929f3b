//! Cross-thread access to the tray.
//!
//! The tray state is owned by one thread. Everything else talks to it by
//! queueing [`TrayCommand`]s through a [`TrayHandle`].

pub mod bus;
pub mod types;

pub use bus::{CommandBus, TrayHandle};
pub use types::{TrayCommand, TrayJob};
