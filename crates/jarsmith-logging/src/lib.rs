//! jarsmith-logging - Tracing subscriber setup
//!
//! This crate provides:
//! - [`init_logging`] installing a formatted stderr subscriber
//! - [`ReloadHandle`] for changing the level after installation

mod reload;
mod subscriber;

pub use jarsmith_core::LogLevel;
pub use reload::{ReloadError, ReloadHandle};
pub use subscriber::{init_logging, level_filter};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{LogLevel, ReloadHandle, init_logging};
}
