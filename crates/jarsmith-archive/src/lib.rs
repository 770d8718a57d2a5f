//! Archive model for jarsmith
//!
//! This crate holds the in-memory representation of a JAR:
//! - [`Resource`] - lazily materialized entry content
//! - [`Zip`] - path-indexed resources with a derived directory index
//! - [`Jar`] - manifest, module and digest handling on top of [`Zip`]
//! - [`JpmsModule`] and [`MultiReleaseJars`] - Multi-Release layering
//!
//! # Example
//!
//! ```no_run
//! use jarsmith_archive::{Jar, Manifest, Resource};
//!
//! let mut jar = Jar::new("demo");
//! jar.put_resource("com/acme/Main.class", Resource::from_file("target/Main.class"), true)?;
//! let mut manifest = Manifest::new();
//! manifest.main_attributes_mut().insert("Bundle-SymbolicName", "com.acme.demo");
//! jar.set_manifest(manifest)?;
//! jar.set_reproducible("2024-01-01T00:00:00Z");
//! jar.write_file("target/demo.jar")?;
//! # Ok::<(), jarsmith_core::ArchiveError>(())
//! ```

mod digest;
mod generator;
mod index;
mod jar;
mod manifest;
mod module_info;
mod resource;

pub mod jpms;
pub mod release_entries;
pub mod timestamp;

pub use digest::{
    DEFAULT_DIGEST_ALGORITHMS, DigestAlgorithm, Digester, compute_sha256, update_all,
};
pub use generator::SharedProperties;
pub use index::{EMPTY_MARKER, WriteSummary, Zip, archive_name};
pub use jar::{DEFAULT_LOCALIZATION_BASE, Jar, MODULE_INFO_CLASS};
pub use jpms::{JpmsModule, MultiReleaseJars};
pub use manifest::{
    AUTOMATIC_MODULE_NAME, Attributes, BND_LASTMODIFIED, BUNDLE_LOCALIZATION,
    BUNDLE_SYMBOLICNAME, BUNDLE_VERSION, IMPORT_PACKAGE, MANIFEST_VERSION, MULTI_RELEASE,
    Manifest, REQUIRE_CAPABILITY,
};
pub use module_info::{ModuleInfo, parse_module_info};
pub use release_entries::ReleaseEntries;
pub use resource::{ContentGenerator, DEFAULT_BUFFER_LIMIT, Resource, SharedZipFile};
