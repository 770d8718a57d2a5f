//! Dynamic log level reloading support

use crate::subscriber::level_filter;
use jarsmith_core::LogLevel;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::reload;

/// Handle type produced by the reloadable level layer
pub(crate) type LevelHandle = reload::Handle<LevelFilter, tracing_subscriber::Registry>;

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("logging has not been initialized")]
    NotInitialized,

    #[error("failed to reload filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle for dynamically reloading the log level filter
pub struct ReloadHandle {
    handle: Mutex<Option<LevelHandle>>,
}

impl ReloadHandle {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Get the global reload handle
    pub fn global() -> &'static ReloadHandle {
        static INSTANCE: OnceCell<ReloadHandle> = OnceCell::new();
        INSTANCE.get_or_init(ReloadHandle::new)
    }

    /// Set the reload handle (called during initialization)
    pub(crate) fn set_handle(&self, handle: LevelHandle) {
        *self.handle.lock() = Some(handle);
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Switch the active filter to `level`
    pub fn reload_level(&self, level: LogLevel) -> Result<(), ReloadError> {
        let guard = self.handle.lock();
        let handle = guard.as_ref().ok_or(ReloadError::NotInitialized)?;
        handle.reload(level_filter(level))?;
        Ok(())
    }

    /// The level currently let through, if initialized
    pub fn current(&self) -> Option<LevelFilter> {
        self.handle
            .lock()
            .as_ref()
            .and_then(|handle| handle.clone_current())
    }
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}
