//! Bundle archives.
//!
//! A [`Jar`] is a [`Zip`] that knows about its manifest and module
//! descriptor. Both are parsed lazily and cached against the identity of
//! the resource they were parsed from, so replacing or removing the
//! resource through any path invalidates the cache.
//!
//! On write the manifest comes first, followed by any signature files,
//! followed by everything else in path order.

use crate::digest::{DEFAULT_DIGEST_ALGORITHMS, DigestAlgorithm, Digester, update_all};
use crate::index::{Sink, WriteSummary, Zip, copy_to_folder, create_output};
use crate::manifest::{
    AUTOMATIC_MODULE_NAME, BND_LASTMODIFIED, BUNDLE_LOCALIZATION, BUNDLE_VERSION, Manifest,
};
use crate::module_info::{ModuleInfo, parse_module_info};
use crate::resource::{ContentGenerator, Resource};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use jarsmith_core::path::{append_path, file_name};
use jarsmith_core::{ArchiveConfig, ArchiveError, ArchiveResult, DEFAULT_MANIFEST_NAME, Instruction};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, trace, warn};
use zip::ZipArchive;
use zip::result::ZipError;

/// Path of the module descriptor of a modular archive
pub const MODULE_INFO_CLASS: &str = "module-info.class";

/// Base name of header translations when `Bundle-Localization` is absent
pub const DEFAULT_LOCALIZATION_BASE: &str = "OSGI-INF/l10n/bundle";

/// A value derived from the resource stored under one path, valid while
/// that exact resource stays there
struct IdentityCache<T> {
    slot: Mutex<Option<(Option<Resource>, T)>>,
}

impl<T: Clone> IdentityCache<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn get(&self, current: Option<&Resource>) -> Option<T> {
        let slot = self.slot.lock();
        let (anchor, value) = slot.as_ref()?;
        let same = match (anchor, current) {
            (None, None) => true,
            (Some(anchor), Some(current)) => anchor.ptr_eq(current),
            _ => false,
        };
        same.then(|| value.clone())
    }

    fn set(&self, anchor: Option<Resource>, value: T) {
        *self.slot.lock() = Some((anchor, value));
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// An archive index with manifest, module and digest handling.
///
/// Derefs to [`Zip`] for path-level operations.
pub struct Jar {
    zip: Zip,
    manifest_name: String,
    manifest: IdentityCache<Option<Manifest>>,
    module: IdentityCache<Option<ModuleInfo>>,
    manifest_first: bool,
    do_not_touch_manifest: bool,
    no_manifest: bool,
    digest_algorithms: Option<Vec<String>>,
    last_write: Option<WriteSummary>,
}

impl Jar {
    /// An empty bundle archive
    pub fn new(name: impl Into<String>) -> Self {
        Self::wrap(Zip::new(name))
    }

    fn wrap(zip: Zip) -> Self {
        Self {
            zip,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            manifest: IdentityCache::new(),
            module: IdentityCache::new(),
            manifest_first: false,
            do_not_touch_manifest: false,
            no_manifest: false,
            digest_algorithms: None,
            last_write: None,
        }
    }

    /// Read a directory or archive file, named after the path
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Ok(Self::wrap(Zip::open(path)?))
    }

    pub fn open_with(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        do_not_copy: Option<&str>,
    ) -> ArchiveResult<Self> {
        Ok(Self::wrap(Zip::open_with(name, path, do_not_copy)?))
    }

    /// Read an archive stream. Every entry is stamped with `last_modified`
    /// when it is positive.
    pub fn from_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        last_modified: i64,
    ) -> ArchiveResult<Self> {
        let fixed = (last_modified > 0).then_some(last_modified);
        Ok(Self::wrap(Zip::read_stream(name, reader, fixed)?))
    }

    /// The archive held by a resource. File resources are opened in place;
    /// anything else is read as a stream.
    pub fn from_resource(name: impl Into<String>, resource: &Resource) -> ArchiveResult<Self> {
        if let Some(path) = resource.file_path() {
            return Self::open_with(name, path, None);
        }
        let input = resource.open_input_stream()?;
        Self::from_reader(name, input, resource.last_modified())
    }

    /// Apply write settings
    pub fn configure(&mut self, config: &ArchiveConfig) -> ArchiveResult<()> {
        self.zip.set_compression(config.compression);
        if let Some(timestamp) = &config.reproducible {
            self.zip.set_reproducible(timestamp);
        }
        self.zip.set_buffer_limit(config.buffer_limit);
        self.set_manifest_name(&config.manifest_name)?;
        let algorithms = (!config.digest_algorithms.is_empty()).then(|| config.digest_algorithms.clone());
        self.set_digest_algorithms(algorithms);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Manifest
    // ------------------------------------------------------------------

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Move the manifest to another path. Empty names are rejected.
    pub fn set_manifest_name(&mut self, name: &str) -> ArchiveResult<()> {
        self.zip.check()?;
        if name.trim().is_empty() {
            return Err(ArchiveError::Policy("manifest name must not be empty".into()));
        }
        if name != self.manifest_name {
            self.manifest_name = name.to_string();
            self.manifest.clear();
        }
        Ok(())
    }

    /// The parsed manifest, `None` when the archive has none
    pub fn manifest(&self) -> ArchiveResult<Option<Manifest>> {
        self.zip.check()?;
        let current = self.zip.get_resource(&self.manifest_name)?;
        if let Some(cached) = self.manifest.get(current.as_ref()) {
            return Ok(cached);
        }
        let manifest = match &current {
            Some(resource) => {
                trace!(jar = %self.zip.name(), "parsing manifest");
                Some(Manifest::parse(&resource.read_all()?)?)
            }
            None => None,
        };
        self.manifest.set(current, manifest.clone());
        Ok(manifest)
    }

    /// Replace the manifest written for this archive.
    ///
    /// Putting a new resource at the manifest path later overrides this.
    pub fn set_manifest(&mut self, manifest: Manifest) -> ArchiveResult<()> {
        self.zip.check()?;
        if self.do_not_touch_manifest {
            return Err(ArchiveError::Policy(format!(
                "the manifest of {} must not be touched",
                self.zip.name()
            )));
        }
        let current = self.zip.get_resource(&self.manifest_name)?;
        self.manifest.set(current, Some(manifest));
        self.manifest_first = true;
        Ok(())
    }

    /// Read the manifest from a file
    pub fn set_manifest_file(&mut self, path: impl AsRef<Path>) -> ArchiveResult<()> {
        let bytes = fs::read(path)?;
        self.set_manifest(Manifest::parse(&bytes)?)
    }

    /// Give the archive an empty manifest when it has none
    pub fn ensure_manifest(&mut self) -> ArchiveResult<()> {
        if self.manifest()?.is_none() {
            let current = self.zip.get_resource(&self.manifest_name)?;
            self.manifest.set(current, Some(Manifest::new()));
        }
        Ok(())
    }

    /// Whether the manifest was set explicitly or was the first entry added
    pub fn is_manifest_first(&self) -> bool {
        self.manifest_first || self.zip.first_entry() == Some(self.manifest_name.as_str())
    }

    /// Freeze the manifest bytes, typically because the archive is signed
    pub fn set_do_not_touch_manifest(&mut self) {
        self.do_not_touch_manifest = true;
    }

    pub fn is_do_not_touch_manifest(&self) -> bool {
        self.do_not_touch_manifest
    }

    /// Write no manifest entry at all
    pub fn set_no_manifest(&mut self, no_manifest: bool) {
        self.no_manifest = no_manifest;
    }

    /// Write the manifest as it would appear in the archive
    pub fn write_manifest(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        self.zip.check()?;
        if self.do_not_touch_manifest {
            if let Some(raw) = self.zip.get_resource(&self.manifest_name)? {
                raw.write(out)?;
            }
            return Ok(());
        }
        if let Some(manifest) = self.manifest()? {
            manifest.write(out)?;
        }
        Ok(())
    }

    /// Bundle symbolic name without directives
    pub fn bsn(&self) -> ArchiveResult<Option<String>> {
        Ok(self.manifest()?.and_then(|m| m.bsn()))
    }

    pub fn version(&self) -> ArchiveResult<Option<String>> {
        Ok(self.manifest()?.and_then(|m| m.version()))
    }

    /// Locate the header translation file for a locale such as `de_CH`,
    /// falling back to less specific locales and finally the base file
    pub fn localization(&self, locale: &str) -> ArchiveResult<Option<Resource>> {
        let base = self
            .manifest()?
            .and_then(|m| m.main_attributes().get(BUNDLE_LOCALIZATION).map(|v| v.trim().to_string()))
            .unwrap_or_else(|| DEFAULT_LOCALIZATION_BASE.to_string());
        let mut parts: Vec<&str> = locale.split('_').filter(|p| !p.is_empty()).collect();
        let mut candidates = Vec::new();
        while !parts.is_empty() {
            candidates.push(format!("{base}_{}.properties", parts.join("_")));
            parts.pop();
        }
        candidates.push(format!("{base}.properties"));
        for candidate in candidates {
            if let Some(resource) = self.zip.get_resource(&candidate)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Module descriptor
    // ------------------------------------------------------------------

    fn module_info(&self) -> ArchiveResult<Option<ModuleInfo>> {
        self.zip.check()?;
        let current = self.zip.get_resource(MODULE_INFO_CLASS)?;
        if let Some(cached) = self.module.get(current.as_ref()) {
            return Ok(cached);
        }
        let info = match &current {
            Some(resource) => parse_module_info(&resource.read_all()?)?,
            None => None,
        };
        self.module.set(current, info.clone());
        Ok(info)
    }

    /// Name from the module descriptor, else `Automatic-Module-Name`
    pub fn module_name(&self) -> ArchiveResult<Option<String>> {
        if let Some(info) = self.module_info()? {
            return Ok(Some(info.name));
        }
        Ok(self.manifest()?.and_then(|m| {
            m.main_attributes()
                .get(AUTOMATIC_MODULE_NAME)
                .map(|v| v.trim().to_string())
        }))
    }

    pub fn module_version(&self) -> ArchiveResult<Option<String>> {
        Ok(self.module_info()?.and_then(|info| info.version))
    }

    // ------------------------------------------------------------------
    // Signatures and digests
    // ------------------------------------------------------------------

    /// Signature files directly under `META-INF`
    pub fn signing_files(&self) -> ArchiveResult<Vec<String>> {
        Ok(match self.zip.directory("META-INF")? {
            Some(children) => children
                .keys()
                .filter(|path| is_signing_file(path))
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }

    /// Remove all signature files; returns true when any was present
    pub fn strip_signatures(&mut self) -> ArchiveResult<bool> {
        let mut stripped = false;
        for path in self.signing_files()? {
            stripped |= self.zip.remove(&path)?.is_some();
        }
        Ok(stripped)
    }

    /// Algorithms for per-entry digests added on every write; `None` disables
    pub fn set_digest_algorithms(&mut self, algorithms: Option<Vec<String>>) {
        self.digest_algorithms = algorithms;
    }

    /// Store per-entry digests as `<ALG>-Digest` attributes in the manifest.
    ///
    /// Without `algorithms` the legacy `SHA` and `MD5` pair is used.
    pub fn calc_checksums(&mut self, algorithms: Option<&[String]>) -> ArchiveResult<()> {
        self.zip.check()?;
        if self.do_not_touch_manifest {
            return Err(ArchiveError::Policy(format!(
                "cannot add digests to the untouchable manifest of {}",
                self.zip.name()
            )));
        }
        let names: Vec<String> = match algorithms {
            Some(names) => names.iter().map(|n| n.trim().to_string()).collect(),
            None => DEFAULT_DIGEST_ALGORITHMS.iter().map(|n| n.to_string()).collect(),
        };
        let kinds = names
            .iter()
            .map(|name| DigestAlgorithm::from_name(name))
            .collect::<ArchiveResult<Vec<_>>>()?;

        let mut manifest = self.manifest()?.unwrap_or_default();
        for (path, resource) in self.zip.resources()? {
            if *path == self.manifest_name {
                continue;
            }
            let mut digesters: Vec<Digester> = kinds.iter().map(|k| Digester::new(*k)).collect();
            match resource.buffer().map_err(|e| e.in_resource(path))? {
                Some(bytes) => digesters.iter_mut().for_each(|d| d.update(&bytes)),
                None => {
                    let mut input = resource.open_input_stream()?;
                    update_all(&mut digesters, input.as_mut()).map_err(|e| ArchiveError::Io(e).in_resource(path))?;
                }
            }
            let section = manifest.section_mut(path);
            for (name, digester) in names.iter().zip(digesters) {
                section.insert(format!("{name}-Digest"), BASE64.encode(digester.finish()));
            }
        }
        self.set_manifest(manifest)
    }

    /// SHA-1 over the manifest and all content that ignores build time:
    /// `Bnd-LastModified` is dropped and `Bundle-Version` loses its
    /// qualifier.
    pub fn timeless_digest(&self) -> ArchiveResult<Vec<u8>> {
        self.zip.check()?;
        let mut digester = Digester::new(DigestAlgorithm::Sha1);
        if let Some(mut manifest) = self.manifest()? {
            let main = manifest.main_attributes_mut();
            main.remove(BND_LASTMODIFIED);
            if let Some(version) = main.get(BUNDLE_VERSION).and_then(version_without_qualifier) {
                main.insert(BUNDLE_VERSION, version);
            }
            manifest.write(&mut digester)?;
        }
        for (path, resource) in self.zip.resources()? {
            if *path == self.manifest_name {
                continue;
            }
            digester.update(path.as_bytes());
            resource.write(&mut digester)?;
        }
        Ok(digester.finish())
    }

    /// SHA-256 of the bytes produced by the last write
    pub fn sha256(&self) -> Option<[u8; 32]> {
        self.last_write.map(|w| w.sha256)
    }

    /// Length of the bytes produced by the last write
    pub fn length(&self) -> Option<u64> {
        self.last_write.map(|w| w.length)
    }

    // ------------------------------------------------------------------
    // Content helpers
    // ------------------------------------------------------------------

    /// Copy the resources of another archive under `destination`, skipping
    /// its manifest. Returns true when any path already existed.
    pub fn add_all(
        &mut self,
        other: &Jar,
        filter: Option<&dyn Instruction>,
        destination: &str,
    ) -> ArchiveResult<bool> {
        self.zip.check()?;
        let mut duplicates = false;
        for (path, resource) in other.resources()? {
            if *path == self.manifest_name {
                continue;
            }
            if filter.is_none_or(|f| f.selects(path)) {
                duplicates |= self
                    .zip
                    .put_resource(&append_path(destination, path), resource.clone(), true)?;
            }
        }
        Ok(duplicates)
    }

    /// `data:` URI of a resource, `None` when it is missing, empty or not
    /// smaller than `max` bytes
    pub fn data_uri(&self, path: &str, mime: &str, max: u64) -> ArchiveResult<Option<String>> {
        let Some(resource) = self.zip.get_resource(path)? else {
            return Ok(None);
        };
        let size = resource.size()?;
        if size == 0 || size >= max {
            return Ok(None);
        }
        let data = resource.read_all()?;
        Ok(Some(format!("data:{mime};base64,{}", BASE64.encode(&data))))
    }

    /// Embedded Maven descriptors at `META-INF/maven/<group>/<artifact>/pom.xml`
    pub fn pom_xml_resources(&self) -> ArchiveResult<Vec<(String, Resource)>> {
        Ok(self
            .zip
            .resources()?
            .iter()
            .filter(|(path, _)| {
                let segments: Vec<&str> = path.split('/').collect();
                segments.len() == 5
                    && segments[0] == "META-INF"
                    && segments[1] == "maven"
                    && segments[4] == "pom.xml"
            })
            .map(|(path, resource)| (path.clone(), resource.clone()))
            .collect())
    }

    /// Read only the manifest of an archive file.
    ///
    /// Entries are scanned as a stream first; when that fails the central
    /// directory is read instead.
    pub fn discover_manifest(path: impl AsRef<Path>) -> ArchiveResult<Option<Manifest>> {
        let path = path.as_ref();
        match scan_manifest(path) {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "streaming manifest scan failed, reading the central directory");
                let file = File::open(path)?;
                let mut archive = ZipArchive::new(file).map_err(|source| ArchiveError::Corrupted {
                    path: path.display().to_string(),
                    source,
                })?;
                let mut entry = match archive.by_name(DEFAULT_MANIFEST_NAME) {
                    Ok(entry) => entry,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                Ok(Some(Manifest::parse(&bytes)?))
            }
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Serialize: manifest, signature files, then the rest in path order.
    ///
    /// With digest algorithms set, the archive is written to a temporary
    /// file, read back, digested and written again so that no resource is
    /// evaluated twice.
    pub fn write(&mut self, out: &mut dyn Write) -> ArchiveResult<WriteSummary> {
        self.write_to(Sink::Stream(out))
    }

    /// Write to a file and stamp it with the archive's modification time.
    /// A failed write removes the file.
    pub fn write_file(&mut self, path: impl AsRef<Path>) -> ArchiveResult<WriteSummary> {
        let path = path.as_ref();
        let result = create_output(path)
            .map_err(ArchiveError::from)
            .and_then(|mut file| {
                let summary = self.write_to(Sink::File(&mut file))?;
                if let Ok(millis) = u64::try_from(self.zip.last_modified()) {
                    if millis > 0 {
                        file.set_modified(UNIX_EPOCH + Duration::from_millis(millis))?;
                    }
                }
                Ok(summary)
            });
        if result.is_err() {
            let _ = fs::remove_file(path);
        }
        result
    }

    fn write_to(&mut self, sink: Sink<'_>) -> ArchiveResult<WriteSummary> {
        self.zip.check()?;
        let summary = match self.digest_algorithms.clone() {
            Some(algorithms) if !self.do_not_touch_manifest && !self.no_manifest => {
                self.write_with_checksums(&algorithms, sink)?
            }
            _ => {
                let leading = self.leading_entries()?;
                self.zip.write_entries(&leading, sink)?
            }
        };
        self.last_write = Some(summary);
        Ok(summary)
    }

    /// Expand into a directory, manifest first
    pub fn write_folder(&self, dir: impl AsRef<Path>) -> ArchiveResult<()> {
        self.zip.check()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        if !self.no_manifest {
            let target = dir.join(&self.manifest_name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut manifest_out = Vec::new();
            self.write_manifest(&mut manifest_out)?;
            if !manifest_out.is_empty() {
                fs::write(&target, manifest_out)?;
            }
        }
        for (path, resource) in self.zip.resources()? {
            if *path == self.manifest_name && !self.no_manifest {
                continue;
            }
            copy_to_folder(dir, path, resource)?;
        }
        Ok(())
    }

    /// Same as [`Jar::write_folder`]
    pub fn expand(&self, dir: impl AsRef<Path>) -> ArchiveResult<()> {
        self.write_folder(dir)
    }

    fn leading_entries(&self) -> ArchiveResult<Vec<(String, Resource)>> {
        let mut leading = Vec::new();
        if self.do_not_touch_manifest {
            if let Some(raw) = self.zip.get_resource(&self.manifest_name)? {
                leading.push((self.manifest_name.clone(), raw));
            }
        } else if !self.no_manifest {
            if let Some(manifest) = self.manifest()? {
                let content = Resource::computed(
                    Arc::new(ManifestContent { manifest }),
                    self.zip.last_modified(),
                );
                leading.push((self.manifest_name.clone(), content));
            }
        }
        for path in self.signing_files()? {
            if let Some(resource) = self.zip.get_resource(&path)? {
                leading.push((path, resource));
            }
        }
        Ok(leading)
    }

    fn write_with_checksums(
        &mut self,
        algorithms: &[String],
        sink: Sink<'_>,
    ) -> ArchiveResult<WriteSummary> {
        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{:_<3}", self.zip.name()))
            .suffix(".jar")
            .tempfile()?;
        let leading = self.leading_entries()?;
        self.zip.write_entries(&leading, Sink::File(temp.as_file_mut()))?;

        let mut copy = Jar::open_with(self.zip.name(), temp.path(), None)?;
        copy.zip.inherit_settings(&self.zip);
        copy.manifest_name = self.manifest_name.clone();
        let result = copy.calc_checksums(Some(algorithms)).and_then(|()| {
            let leading = copy.leading_entries()?;
            copy.zip.write_entries(&leading, sink)
        });
        copy.close();
        debug!(jar = %self.zip.name(), algorithms = ?algorithms, "wrote archive with entry digests");
        result
    }

    /// Release the archive; idempotent
    pub fn close(&mut self) {
        self.zip.close();
        self.manifest.clear();
        self.module.clear();
    }
}

impl Deref for Jar {
    type Target = Zip;

    fn deref(&self) -> &Zip {
        &self.zip
    }
}

impl DerefMut for Jar {
    fn deref_mut(&mut self) -> &mut Zip {
        &mut self.zip
    }
}

impl fmt::Debug for Jar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jar")
            .field("zip", &self.zip)
            .field("manifest_name", &self.manifest_name)
            .field("do_not_touch_manifest", &self.do_not_touch_manifest)
            .finish()
    }
}

impl fmt::Display for Jar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Jar:{}", self.zip.name())
    }
}

/// The canonical manifest serialization, produced at write time
struct ManifestContent {
    manifest: Manifest,
}

impl ContentGenerator for ManifestContent {
    fn generate(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        Ok(self.manifest.write(out)?)
    }

    fn describe(&self) -> String {
        "manifest".to_string()
    }
}

fn is_signing_file(path: &str) -> bool {
    let name = file_name(path).to_ascii_uppercase();
    name.ends_with(".SF")
        || name.ends_with(".DSA")
        || name.ends_with(".RSA")
        || name.starts_with("SIG-")
}

/// `major.minor.micro` of an OSGi version, `None` when not a version
fn version_without_qualifier(version: &str) -> Option<String> {
    let mut parts = version.trim().splitn(4, '.');
    let mut numbers = [0u64; 3];
    for (i, slot) in numbers.iter_mut().enumerate() {
        match parts.next() {
            Some(part) => *slot = part.parse().ok()?,
            None if i > 0 => break,
            None => return None,
        }
    }
    Some(format!("{}.{}.{}", numbers[0], numbers[1], numbers[2]))
}

fn scan_manifest(path: &Path) -> ArchiveResult<Option<Manifest>> {
    let mut reader = BufReader::new(File::open(path)?);
    while let Some(mut entry) = zip::read::read_zipfile_from_stream(&mut reader)? {
        if entry.name().eq_ignore_ascii_case(DEFAULT_MANIFEST_NAME) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            return Ok(Some(Manifest::parse(&bytes)?));
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "jar/jar_tests.rs"]
mod jar_tests;
