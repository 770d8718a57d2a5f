//! Archive configuration types

use serde::{Deserialize, Serialize};

/// Default location of the JAR manifest
pub const DEFAULT_MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// File and directory names skipped when ingesting a directory
pub const DEFAULT_DO_NOT_COPY: &str = r"CVS|\.svn|\.git|\.DS_Store";

/// Compression applied uniformly to every entry of a written archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Store,
}

impl Compression {
    /// Parse a compression mode name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deflate" | "deflated" => Some(Compression::Deflate),
            "store" | "stored" => Some(Compression::Store),
            _ => None,
        }
    }
}

/// Settings applied to an archive before it is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Entry compression
    #[serde(default)]
    pub compression: Compression,

    /// Output timestamp for reproducible builds
    ///
    /// Accepts `"true"`, `"false"`, epoch seconds, or an RFC 3339 date-time.
    #[serde(default)]
    pub reproducible: Option<String>,

    /// Digest algorithms recorded per entry in the manifest
    #[serde(default)]
    pub digest_algorithms: Vec<String>,

    /// Path of the manifest inside the archive
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Regular expression of names skipped while walking a directory
    #[serde(default = "default_do_not_copy")]
    pub do_not_copy: String,

    /// File resources larger than this are streamed instead of buffered
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: u64,
}

fn default_manifest_name() -> String {
    DEFAULT_MANIFEST_NAME.to_string()
}

fn default_do_not_copy() -> String {
    DEFAULT_DO_NOT_COPY.to_string()
}

fn default_buffer_limit() -> u64 {
    64 * 1024 * 1024
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            reproducible: None,
            digest_algorithms: Vec::new(),
            manifest_name: default_manifest_name(),
            do_not_copy: default_do_not_copy(),
            buffer_limit: default_buffer_limit(),
        }
    }
}

impl ArchiveConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Returns true when a reproducible timestamp was requested
    pub fn is_reproducible(&self) -> bool {
        self.reproducible
            .as_deref()
            .map(|s| !s.trim().eq_ignore_ascii_case("false") && !s.trim().is_empty())
            .unwrap_or(false)
    }
}


#[cfg(test)]
#[path = "config/config_parameterized_tests.rs"]
mod config_parameterized_tests;
