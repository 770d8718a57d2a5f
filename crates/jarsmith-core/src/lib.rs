//! jarsmith-core - Shared types for the jarsmith archive toolkit
//!
//! This crate provides the foundations the archive, shading and CLI crates
//! build on:
//! - [`ArchiveError`] and [`ArchiveResult`] for error handling
//! - [`ArchiveConfig`] for archive write settings
//! - [`Instruction`] for name selection rules
//! - [`path`] helpers for archive path normalization

mod config;
mod error;
mod instruction;
pub mod path;

pub use config::{ArchiveConfig, Compression, DEFAULT_DO_NOT_COPY, DEFAULT_MANIFEST_NAME};
pub use error::{ArchiveError, ArchiveResult};
pub use instruction::{Instruction, PatternInstruction};

/// Log levels understood by the logging setup
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }

    /// Map a `-v` repetition count to a level, starting from `Warn`
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArchiveConfig, ArchiveError, ArchiveResult, Compression, Instruction, LogLevel,
        PatternInstruction,
    };
}
