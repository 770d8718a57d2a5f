//! Subscriber installation

use crate::reload::ReloadHandle;
use jarsmith_core::LogLevel;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload;

/// Convert LogLevel to tracing LevelFilter
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Off => LevelFilter::OFF,
    }
}

/// A formatting subscriber behind a reloadable level filter
pub(crate) fn build_subscriber<W>(
    level: LogLevel,
    writer: W,
) -> (impl Subscriber + Send + Sync, crate::reload::LevelHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(level_filter(level));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false),
    );
    (subscriber, handle)
}

/// Install the global subscriber writing to stderr.
///
/// Returns false when a global subscriber was already installed; the level
/// of an earlier jarsmith installation can still be changed through
/// [`ReloadHandle::global`].
pub fn init_logging(level: LogLevel) -> bool {
    let (subscriber, handle) = build_subscriber(level, std::io::stderr);
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => {
            ReloadHandle::global().set_handle(handle);
            true
        }
        Err(_) => false,
    }
}
