//! Native backends.
//!
//! The core only talks to [`crate::native::Native`]; this module holds the
//! real implementation for each supported OS.

#[cfg(target_os = "windows")]
pub mod windows;
