//! Error types for archive operations

use thiserror::Error;

/// Result type alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Error type for archive and resource operations
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error while reading or writing content
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP encoding or decoding error
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The source archive could not be read
    #[error("the JAR/ZIP file ({path}) seems corrupted, error: {source}")]
    Corrupted {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive or resource was used after `close()`
    #[error("already closed {0}")]
    Closed(String),

    /// The manifest could not be parsed or is malformed
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The call violates a policy set on the archive
    #[error("policy violation: {0}")]
    Policy(String),

    /// An argument was rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested digest algorithm is not known
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigest(String),

    /// A command resource exited unsuccessfully
    #[error("command `{command}` failed with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// Writing a single entry failed
    #[error("problem writing resource {path}: {source}")]
    Resource {
        path: String,
        #[source]
        source: Box<ArchiveError>,
    },

    /// The class rewriter rejected an entry
    #[error("failed to rewrite {path}: {message}")]
    Rewrite { path: String, message: String },
}

impl ArchiveError {
    /// Returns true when the error signals use of a closed archive or resource
    pub fn is_closed(&self) -> bool {
        match self {
            ArchiveError::Closed(_) => true,
            ArchiveError::Resource { source, .. } => source.is_closed(),
            _ => false,
        }
    }

    /// Returns true for environmental failures (I/O, corrupted or unreadable input)
    pub fn is_io(&self) -> bool {
        match self {
            ArchiveError::Io(_) | ArchiveError::Zip(_) | ArchiveError::Corrupted { .. } => true,
            ArchiveError::Resource { source, .. } => source.is_io(),
            _ => false,
        }
    }

    /// Wrap this error with the path of the entry being written
    pub fn in_resource(self, path: impl Into<String>) -> Self {
        ArchiveError::Resource {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Build an I/O error signalling that a backing store is gone
    pub fn unavailable(what: impl std::fmt::Display) -> Self {
        ArchiveError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("backing store unavailable: {what}"),
        ))
    }
}

#[cfg(test)]
#[path = "error/error_tests.rs"]
mod error_tests;
