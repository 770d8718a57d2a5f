//! Read-only inspection commands and the release view

use crate::build;
use anyhow::{Context, Result};
use jarsmith_archive::{Jar, JpmsModule, MultiReleaseJars, compute_sha256};
use std::path::Path;
use tracing::debug;

fn open(path: &Path) -> Result<Jar> {
    Jar::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// One line per resource: path and size
pub fn list(path: &Path) -> Result<Vec<String>> {
    let jar = open(path)?;
    let mut lines = Vec::new();
    for (name, resource) in jar.resources()? {
        let size = resource
            .size()
            .with_context(|| format!("Failed to size {name}"))?;
        lines.push(format!("{size:>10}  {name}"));
    }
    Ok(lines)
}

/// Multi-Release summary: the manifest flag, then each release with its
/// entry count and module name
pub fn versions(path: &Path) -> Result<Vec<String>> {
    let module = JpmsModule::new(open(path)?);
    let mut lines = vec![format!("multi-release: {}", module.is_multi_release()?)];
    let base = module.release_only(0)?;
    lines.push(describe(&module, 0, base.resources()?.len())?);
    for release in module.versions()? {
        let entries = module.release_only(release)?.resources()?.len();
        lines.push(describe(&module, release, entries)?);
    }
    Ok(lines)
}

fn describe(module: &JpmsModule, release: u32, entries: usize) -> Result<String> {
    let label = if release == 0 {
        "base".to_string()
    } else {
        release.to_string()
    };
    let name = module.module_name(release)?.unwrap_or_else(|| "-".to_string());
    Ok(format!("{label:>5}  {entries:>6} entries  module {name}"))
}

/// Content digests of an archive file
pub fn digest(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let jar = open(path)?;
    let timeless = jar.timeless_digest()?;
    Ok(vec![
        format!("length   {}", bytes.len()),
        format!("sha256   {}", compute_sha256(&bytes)),
        format!("timeless {}", hex::encode(timeless)),
    ])
}

/// Flatten a Multi-Release archive for one release and write it
pub fn view(path: &Path, release: u32, output: &Path) -> Result<()> {
    let jar = open(path)?;
    let mut flat = MultiReleaseJars::view(&jar, release)
        .with_context(|| format!("Failed to flatten {} for release {release}", path.display()))?;
    debug!(release, entries = flat.resources()?.len(), "release view");
    let summary = build::write(&mut flat, output)?;
    println!(
        "✓ Wrote {} for release {} ({} bytes)",
        output.display(),
        release,
        summary.length
    );
    Ok(())
}
