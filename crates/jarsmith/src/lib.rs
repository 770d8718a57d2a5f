//! # jarsmith
//!
//! Build, rewrite and inspect JAR archives from Rust.
//!
//! jarsmith keeps an archive as an index of lazily materialized resources
//! and provides:
//! - Resources backed by files, buffers, URLs, archive entries, nested
//!   archives or content computed at write time
//! - Manifest handling, per-entry digests and signature stripping
//! - Byte-identical output for reproducible builds
//! - Multi-Release layering and per-release views
//! - Package relocation through a pluggable class rewriter
//!
//! ## Quick Start
//!
//! ```no_run
//! use jarsmith::prelude::*;
//!
//! init_logging(LogLevel::Info);
//!
//! let mut jar = Jar::open("target/classes")?;
//! let mut manifest = Manifest::new();
//! manifest.main_attributes_mut().insert("Bundle-SymbolicName", "com.acme.app");
//! jar.set_manifest(manifest)?;
//! jar.set_reproducible("true");
//! let summary = jar.write_file("target/app.jar")?;
//! tracing::info!(length = summary.length, "done");
//!
//! let java17 = MultiReleaseJars::view(&jar, 17)?;
//! println!("{} entries for Java 17", java17.resources()?.len());
//! # Ok::<(), ArchiveError>(())
//! ```
//!
//! ## Crate Structure
//!
//! This is a facade crate that re-exports from:
//! - [`jarsmith_core`] - Errors, configuration, paths and selection rules
//! - [`jarsmith_archive`] - Resources, archives, manifests and release layers
//! - [`jarsmith_shade`] - Package relocation
//! - [`jarsmith_logging`] - Subscriber setup

// Re-export core types
pub use jarsmith_core::{
    ArchiveConfig, ArchiveError, ArchiveResult, Compression, Instruction, LogLevel,
    PatternInstruction, path,
};

// Re-export the archive model
pub use jarsmith_archive::{
    Attributes, ContentGenerator, Jar, JpmsModule, Manifest, ModuleInfo, MultiReleaseJars,
    ReleaseEntries, Resource, SharedProperties, WriteSummary, Zip, jpms, timestamp,
};

// Re-export shading
pub use jarsmith_shade::{ClassRewriter, ShadePlan, ShadeRule, ShadeSeed, Shader};

// Re-export logging setup
pub use jarsmith_logging::{ReloadHandle, init_logging};

pub use tracing;

/// Prelude module for convenient imports.
///
/// Use `use jarsmith::prelude::*;` to import commonly used types.
pub mod prelude {
    pub use crate::{
        ArchiveConfig, ArchiveError, ArchiveResult, Compression, Instruction, Jar, JpmsModule,
        LogLevel, Manifest, MultiReleaseJars, PatternInstruction, Resource, Zip, init_logging,
    };
}
