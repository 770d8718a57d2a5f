//! Build command implementation

use crate::settings::{self, Overrides, Settings};
use anyhow::{Context, Result};
use jarsmith_archive::{Jar, WriteSummary, archive_name};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options of the build command
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub overrides: Overrides,
}

/// Run the build command
pub fn run(options: &BuildOptions) -> Result<WriteSummary> {
    let settings_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let settings = Settings::load(options.config.as_deref(), &settings_dir)?;
    let config = settings.apply(&options.overrides);
    settings::validate(&config)?;

    println!("Building archive from: {}", options.source.display());

    let mut jar = Jar::open_with(
        archive_name(&options.source),
        &options.source,
        Some(&config.do_not_copy),
    )
    .with_context(|| format!("Failed to read {}", options.source.display()))?;
    jar.configure(&config).context("Failed to apply archive settings")?;

    if let Some(manifest) = &options.manifest {
        jar.set_manifest_file(manifest)
            .with_context(|| format!("Failed to read manifest: {}", manifest.display()))?;
    } else {
        jar.ensure_manifest()?;
    }

    let summary = write(&mut jar, &options.output)?;
    info!(
        jar = %jar.name(),
        entries = jar.resources()?.len(),
        reproducible = jar.is_reproducible(),
        "built archive"
    );
    println!(
        "✓ Wrote {} ({} bytes, sha256 {})",
        options.output.display(),
        summary.length,
        hex::encode(summary.sha256)
    );
    jar.close();
    Ok(summary)
}

pub(crate) fn write(jar: &mut Jar, output: &Path) -> Result<WriteSummary> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    jar.write_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))
}
