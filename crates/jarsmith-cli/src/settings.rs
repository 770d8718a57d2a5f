//! jarsmith.toml loading and validation

use anyhow::{Context, Result};
use jarsmith_archive::DigestAlgorithm;
use jarsmith_core::{ArchiveConfig, Compression};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_SETTINGS_FILE: &str = "jarsmith.toml";

/// jarsmith.toml structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Command-line flags that take precedence over the settings file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub reproducible: Option<String>,
    pub store: bool,
    pub digests: Vec<String>,
}

impl Settings {
    /// Load settings from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings: {:?}", path.as_ref()))?;

        Self::parse(&content)
    }

    /// Parse settings from a string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings")
    }

    /// An explicit file must exist; otherwise `jarsmith.toml` in `dir` is
    /// used when present, and defaults when not
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let candidate = dir.join(DEFAULT_SETTINGS_FILE);
                if candidate.is_file() {
                    Self::from_file(candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Merge command-line flags into the archive configuration
    pub fn apply(mut self, overrides: &Overrides) -> ArchiveConfig {
        if let Some(timestamp) = &overrides.reproducible {
            self.archive.reproducible = Some(timestamp.clone());
        }
        if overrides.store {
            self.archive.compression = Compression::Store;
        }
        if !overrides.digests.is_empty() {
            self.archive.digest_algorithms = overrides.digests.clone();
        }
        self.archive
    }
}

/// Reject configurations the archive layer would fail on mid-write
pub fn validate(config: &ArchiveConfig) -> Result<()> {
    if config.manifest_name.trim().is_empty() {
        anyhow::bail!("Manifest name cannot be empty");
    }
    for name in &config.digest_algorithms {
        DigestAlgorithm::from_name(name).with_context(|| format!("Invalid digest algorithm in settings: {name}"))?;
    }
    if config.buffer_limit == 0 {
        anyhow::bail!("Buffer limit must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
#[path = "settings/settings_tests.rs"]
mod settings_tests;
