//! The path-keyed archive index.
//!
//! [`Zip`] keeps resources in a sorted map plus a directory index mapping
//! every directory (down to the root `""`) to the resources directly inside
//! it. Sorted order drives the byte layout of written archives and makes
//! subtree removal a range operation.

use crate::resource::{DEFAULT_BUFFER_LIMIT, Resource, SharedZipFile};
use crate::timestamp::{from_zip_time, now_millis, parse_output_timestamp, to_zip_time};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use jarsmith_core::path::{ancestors, clean_path, in_subtree, parent};
use jarsmith_core::{ArchiveError, ArchiveResult, Compression, DEFAULT_DO_NOT_COPY};
use parking_lot::Mutex;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::SpooledTempFile;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::{FullFileOptions, SimpleFileOptions};
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Path suffix marking a directory that must exist without content
pub const EMPTY_MARKER: &str = "<<EMPTY>>";

/// Extra-field ids the ZIP writer manages itself
const MANAGED_EXTRA_IDS: [u16; 4] = [0x0001, 0x5455, 0x7075, 0x9901];

/// Length and SHA-256 of a serialized archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub length: u64,
    pub sha256: [u8; 32],
}

/// A path-keyed store of resources with a derived directory index
pub struct Zip {
    name: String,
    source: Option<PathBuf>,
    resources: BTreeMap<String, Resource>,
    directories: BTreeMap<String, BTreeMap<String, Resource>>,
    last_modified: i64,
    last_modified_reason: String,
    compression: Compression,
    output_time: Option<i64>,
    buffer_limit: u64,
    backing: Option<SharedZipFile>,
    first_entry: Option<String>,
    /// Resources belong to another archive; closing only drops the maps
    borrowed: bool,
    closed: bool,
}

impl Zip {
    /// An empty index
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            resources: BTreeMap::new(),
            directories: BTreeMap::new(),
            last_modified: 0,
            last_modified_reason: String::new(),
            compression: Compression::default(),
            output_time: None,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            backing: None,
            first_entry: None,
            borrowed: false,
            closed: false,
        }
    }

    /// Index a directory tree or an archive file, named after the path
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        Self::open_with(archive_name(path), path, Some(DEFAULT_DO_NOT_COPY))
    }

    /// Index a directory tree or an archive file.
    ///
    /// `do_not_copy` is a regular expression matched against each file and
    /// directory name during a directory walk; matches are skipped.
    pub fn open_with(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        do_not_copy: Option<&str>,
    ) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let mut zip = Self::new(name);
        zip.source = Some(path.to_path_buf());
        if path.is_dir() {
            let pattern = do_not_copy
                .map(|p| {
                    Regex::new(&format!("^(?:{p})$"))
                        .map_err(|e| ArchiveError::InvalidArgument(format!("{p}: {e}")))
                })
                .transpose()?;
            zip.build_from_directory(path, pattern.as_ref())?;
        } else if path.is_file() {
            zip.build_from_archive_file(path)?;
        } else {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("an archive can only be read from an existing file or directory: {}", path.display()),
            )));
        }
        Ok(zip)
    }

    /// Index an archive read fully from a stream
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> ArchiveResult<Self> {
        Self::read_stream(name, reader, None)
    }

    /// Index an archive stream; with `fixed_time` every entry gets that time
    /// instead of its own
    pub(crate) fn read_stream<R: Read>(
        name: impl Into<String>,
        mut reader: R,
        fixed_time: Option<i64>,
    ) -> ArchiveResult<Self> {
        let mut zip = Self::new(name);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        zip.build_from_bytes(bytes, fixed_time)?;
        Ok(zip)
    }

    fn build_from_directory(&mut self, base: &Path, do_not_copy: Option<&Regex>) -> ArchiveResult<()> {
        let skipped = |entry: &walkdir::DirEntry| {
            entry.depth() > 0
                && do_not_copy.is_some_and(|p| p.is_match(&entry.file_name().to_string_lossy()))
        };
        let walker = WalkDir::new(base)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skipped(e));
        for entry in walker {
            let entry = entry.map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(base)
                .map_err(|e| ArchiveError::InvalidArgument(e.to_string()))?;
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let resource = Resource::from_file_with_limit(entry.path(), self.buffer_limit);
            self.put_resource(&path, resource, true)?;
        }
        debug!(name = %self.name, dir = %base.display(), entries = self.resources.len(), "indexed directory");
        Ok(())
    }

    fn build_from_archive_file(&mut self, path: &Path) -> ArchiveResult<()> {
        let corrupted = |source| ArchiveError::Corrupted {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(path).map_err(|e| {
            ArchiveError::Io(std::io::Error::new(
                e.kind(),
                format!("problem opening archive {}: {e}", path.display()),
            ))
        })?;
        let mut archive = ZipArchive::new(file).map_err(corrupted)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(corrupted)?;
            if entry.is_dir() {
                continue;
            }
            let time = entry.last_modified().map(from_zip_time).unwrap_or(0);
            let extra = entry
                .extra_data()
                .filter(|data| !data.is_empty())
                .map(|data| BASE64.encode(data));
            entries.push((index, entry.name().to_string(), entry.size(), time, extra));
        }

        let shared: SharedZipFile = Arc::new(Mutex::new(Some(archive)));
        for (index, name, size, time, extra) in entries {
            let resource = Resource::from_zip_entry(shared.clone(), index, name.clone(), size, time);
            resource.set_extra(extra);
            self.put_resource(&name, resource, true)?;
        }
        self.backing = Some(shared);
        debug!(name = %self.name, file = %path.display(), entries = self.resources.len(), "indexed archive");
        Ok(())
    }

    fn build_from_bytes(&mut self, bytes: Vec<u8>, fixed_time: Option<i64>) -> ArchiveResult<()> {
        let corrupted = |source| ArchiveError::Corrupted {
            path: self.name.clone(),
            source,
        };
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(corrupted)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(corrupted)?;
            if entry.is_dir() {
                continue;
            }
            let time = fixed_time
                .or_else(|| entry.last_modified().map(from_zip_time))
                .unwrap_or(0);
            let extra = entry
                .extra_data()
                .filter(|data| !data.is_empty())
                .map(|data| BASE64.encode(data));
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            entries.push((entry.name().to_string(), content, time, extra));
        }
        for (name, content, time, extra) in entries {
            let resource = Resource::from_bytes(content, time);
            resource.set_extra(extra);
            self.put_resource(&name, resource, true)?;
        }
        Ok(())
    }

    pub(crate) fn check(&self) -> ArchiveResult<()> {
        if self.closed {
            return Err(ArchiveError::Closed(self.name.clone()));
        }
        Ok(())
    }

    /// Store a resource under a normalized path.
    ///
    /// Returns true when the path was already present. An existing resource
    /// is replaced only when `overwrite` is set.
    pub fn put_resource(&mut self, path: &str, resource: Resource, overwrite: bool) -> ArchiveResult<bool> {
        self.check()?;
        let path = clean_path(path);
        let dir = parent(&path).to_string();
        if !self.directories.contains_key(&dir) {
            for ancestor in ancestors(&dir) {
                self.directories.entry(ancestor.to_string()).or_default();
            }
        }
        if self.resources.is_empty() {
            self.first_entry = Some(path.clone());
        }
        let children = self.directories.entry(dir).or_default();
        let duplicate = children.contains_key(&path);
        if !duplicate || overwrite {
            let modified = resource.last_modified();
            children.insert(path.clone(), resource.clone());
            self.resources.insert(path.clone(), resource);
            self.update_modified(modified, &path);
            trace!(path = %path, duplicate, "put resource");
        }
        Ok(duplicate)
    }

    pub fn get_resource(&self, path: &str) -> ArchiveResult<Option<Resource>> {
        self.check()?;
        Ok(self.resources.get(&clean_path(path)).cloned())
    }

    pub fn exists(&self, path: &str) -> ArchiveResult<bool> {
        self.check()?;
        Ok(self.resources.contains_key(&clean_path(path)))
    }

    pub fn is_empty(&self) -> ArchiveResult<bool> {
        self.check()?;
        Ok(self.resources.is_empty())
    }

    /// All resources in path order
    pub fn resources(&self) -> ArchiveResult<&BTreeMap<String, Resource>> {
        self.check()?;
        Ok(&self.resources)
    }

    /// Resource paths accepted by the predicate, in path order
    pub fn resource_names(&self, matches: impl Fn(&str) -> bool) -> ArchiveResult<Vec<String>> {
        self.check()?;
        Ok(self
            .resources
            .keys()
            .filter(|k| matches(k))
            .cloned()
            .collect())
    }

    pub fn directories(&self) -> ArchiveResult<&BTreeMap<String, BTreeMap<String, Resource>>> {
        self.check()?;
        Ok(&self.directories)
    }

    /// Resources directly inside a directory
    pub fn directory(&self, path: &str) -> ArchiveResult<Option<&BTreeMap<String, Resource>>> {
        self.check()?;
        Ok(self.directories.get(&clean_path(path)))
    }

    pub fn has_directory(&self, path: &str) -> ArchiveResult<bool> {
        self.check()?;
        Ok(self.directories.contains_key(&clean_path(path)))
    }

    /// Put every resource of a directory listing; returns true if any was a duplicate
    pub fn add_directory(
        &mut self,
        directory: &BTreeMap<String, Resource>,
        overwrite: bool,
    ) -> ArchiveResult<bool> {
        self.check()?;
        let mut duplicates = false;
        for (path, resource) in directory {
            duplicates |= self.put_resource(path, resource.clone(), overwrite)?;
        }
        Ok(duplicates)
    }

    /// Copy the resources directly inside `path` of another index
    pub fn copy(&mut self, source: &Zip, path: &str, overwrite: bool) -> ArchiveResult<bool> {
        self.check()?;
        match source.directory(path)? {
            Some(directory) => {
                let directory = directory.clone();
                self.add_directory(&directory, overwrite)
            }
            None => Ok(false),
        }
    }

    /// Remove one resource. Its directory entry stays, possibly empty.
    pub fn remove(&mut self, path: &str) -> ArchiveResult<Option<Resource>> {
        self.check()?;
        let path = clean_path(path);
        let removed = self.resources.remove(&path);
        if removed.is_some() {
            if let Some(children) = self.directories.get_mut(parent(&path)) {
                children.remove(&path);
            }
        }
        Ok(removed)
    }

    /// Move a resource; returns false without changes when `old` is absent
    pub fn rename(&mut self, old: &str, new: &str) -> ArchiveResult<bool> {
        self.check()?;
        match self.remove(old)? {
            Some(resource) => {
                self.put_resource(new, resource, true)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a whole subtree.
    ///
    /// `a/b` removes `a/b` itself and everything below `a/b/`, but not
    /// `a/bc`. A trailing slash keeps a resource named exactly `a/b`.
    pub fn remove_prefix(&mut self, prefix: &str) -> ArchiveResult<()> {
        self.check()?;
        let prefix = clean_path(prefix);
        let doomed = subtree_keys(&self.resources, &prefix);
        for path in &doomed {
            self.resources.remove(path);
            if let Some(children) = self.directories.get_mut(parent(path)) {
                children.remove(path);
            }
        }
        let dir_prefix = prefix.trim_end_matches('/');
        for dir in subtree_keys(&self.directories, dir_prefix) {
            self.directories.remove(&dir);
        }
        if dir_prefix.is_empty() && !self.resources.is_empty() {
            self.directories.entry(String::new()).or_default();
        }
        debug!(name = %self.name, prefix = %prefix, removed = doomed.len(), "removed prefix");
        Ok(())
    }

    /// Remove every subdirectory of `dir`, keeping the resources directly in it
    pub fn remove_sub_dirs(&mut self, dir: &str) -> ArchiveResult<()> {
        self.check()?;
        let mut dir = clean_path(dir);
        if !dir.ends_with('/') {
            dir.push('/');
        }
        let sub_dirs: Vec<String> = self
            .directories
            .range::<str, _>((Bound::Included(dir.as_str()), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(dir.as_str()))
            .map(|(k, _)| k.clone())
            .collect();
        for sub_dir in sub_dirs {
            self.remove_prefix(&format!("{sub_dir}/"))?;
        }
        Ok(())
    }

    /// Dotted names of the directories holding `.class` files, outside
    /// `META-INF`
    pub fn packages(&self) -> ArchiveResult<Vec<String>> {
        self.check()?;
        Ok(self
            .directories
            .iter()
            .filter(|(dir, _)| !dir.is_empty() && !in_subtree(dir, "META-INF"))
            .filter(|(_, children)| children.keys().any(|k| k.ends_with(".class")))
            .map(|(dir, _)| dir.replace('/', "."))
            .collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Directory or file this index was read from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: Option<PathBuf>) {
        self.source = source;
    }

    /// Latest resource time seen, in epoch milliseconds
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Which path or event produced [`Zip::last_modified`]
    pub fn last_modified_reason(&self) -> &str {
        &self.last_modified_reason
    }

    pub fn update_modified(&mut self, time: i64, reason: &str) {
        if time > self.last_modified {
            self.last_modified = time;
            self.last_modified_reason = reason.to_string();
        }
    }

    /// Set the output timestamp; see [`parse_output_timestamp`]
    pub fn set_reproducible(&mut self, output_timestamp: &str) {
        self.output_time = parse_output_timestamp(output_timestamp);
    }

    pub fn is_reproducible(&self) -> bool {
        self.output_time.is_some()
    }

    /// Fixed entry time in epoch milliseconds, when reproducible
    pub fn output_time(&self) -> Option<i64> {
        self.output_time
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Size above which files ingested later are streamed
    pub fn set_buffer_limit(&mut self, limit: u64) {
        self.buffer_limit = limit;
    }

    /// Path inserted while the index was empty, most recently
    pub(crate) fn first_entry(&self) -> Option<&str> {
        self.first_entry.as_deref()
    }

    pub(crate) fn inherit_settings(&mut self, other: &Zip) {
        self.compression = other.compression;
        self.output_time = other.output_time;
        self.buffer_limit = other.buffer_limit;
        self.source = other.source.clone();
    }

    /// Mark the resources as owned by the archive they were taken from
    pub(crate) fn borrow_resources(&mut self) {
        self.borrowed = true;
    }

    /// Serialize all resources in path order
    pub fn write(&self, out: &mut dyn Write) -> ArchiveResult<WriteSummary> {
        self.write_entries(&[], Sink::Stream(out))
    }

    /// Serialize with `leading` entries first, then every other resource in
    /// path order.
    ///
    /// Files are written in place. Other sinks receive the archive from a
    /// spool that stays in memory up to the buffer limit and moves to a
    /// temporary file beyond it.
    pub(crate) fn write_entries(
        &self,
        leading: &[(String, Resource)],
        sink: Sink<'_>,
    ) -> ArchiveResult<WriteSummary> {
        self.check()?;
        let summary = match sink {
            Sink::Stream(out) => {
                let limit = usize::try_from(self.buffer_limit).unwrap_or(usize::MAX);
                let mut spool = self.write_zip(leading, SpooledTempFile::new(limit))?;
                spool.rewind()?;
                let mut hashing = HashingWriter::new(out);
                io::copy(&mut spool, &mut hashing)?;
                hashing.flush()?;
                hashing.summary()
            }
            Sink::File(file) => {
                self.write_zip(leading, &mut *file)?;
                file.flush()?;
                file.rewind()?;
                let mut discard = io::sink();
                let mut hashing = HashingWriter::new(&mut discard);
                io::copy(file, &mut hashing)?;
                hashing.summary()
            }
        };
        debug!(name = %self.name, bytes = summary.length, entries = self.resources.len(), "wrote archive");
        Ok(summary)
    }

    fn write_zip<W: Write + Seek>(&self, leading: &[(String, Resource)], sink: W) -> ArchiveResult<W> {
        let archive_time = if self.last_modified > 0 {
            self.last_modified
        } else {
            now_millis()
        };
        let mut writer = EntryWriter::new(sink, self.compression, self.output_time, archive_time);
        let mut done = HashSet::new();
        for (path, resource) in leading {
            writer.write_resource(path, resource)?;
            done.insert(path.as_str());
        }
        for (path, resource) in &self.resources {
            if !done.contains(path.as_str()) {
                writer.write_resource(path, resource)?;
            }
        }
        writer.finish()
    }

    /// Write to a file, removing it again when writing fails
    pub fn write_file(&self, path: impl AsRef<Path>) -> ArchiveResult<WriteSummary> {
        let path = path.as_ref();
        let result = create_output(path)
            .map_err(ArchiveError::from)
            .and_then(|mut file| self.write_entries(&[], Sink::File(&mut file)));
        if result.is_err() {
            let _ = fs::remove_file(path);
        }
        result
    }

    /// Copy every resource to a file under `dir`
    pub fn write_folder(&self, dir: impl AsRef<Path>) -> ArchiveResult<()> {
        self.check()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (path, resource) in &self.resources {
            copy_to_folder(dir, path, resource)?;
        }
        Ok(())
    }

    /// Release all resources; idempotent. Any later use fails with
    /// [`ArchiveError::Closed`]. An archive derived from another one leaves
    /// the shared resources open.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if !self.borrowed {
            for resource in self.resources.values() {
                resource.close();
            }
            if let Some(backing) = self.backing.take() {
                *backing.lock() = None;
            }
        }
        self.resources.clear();
        self.directories.clear();
        self.source = None;
        debug!(name = %self.name, "closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for Zip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zip")
            .field("name", &self.name)
            .field("entries", &self.resources.len())
            .field("borrowed", &self.borrowed)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Archive name for a file or directory: `.jar` is dropped, and `bin` or
/// `src` directories are named after their parent
pub fn archive_name(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name == "bin" || name == "src" {
        if let Some(parent_name) = absolute.parent().and_then(Path::file_name) {
            return parent_name.to_string_lossy().into_owned();
        }
    }
    name.strip_suffix(".jar").map(str::to_string).unwrap_or(name)
}

/// Where a serialized archive goes
pub(crate) enum Sink<'a> {
    Stream(&'a mut dyn Write),
    /// A file opened for reading and writing, positioned at its start
    File(&'a mut File),
}

/// Truncate or create a file that can be read back after writing
pub(crate) fn create_output(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Counts and hashes the bytes passed on to a sink
struct HashingWriter<'a> {
    out: &'a mut dyn Write,
    hasher: Sha256,
    length: u64,
}

impl<'a> HashingWriter<'a> {
    fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out,
            hasher: Sha256::new(),
            length: 0,
        }
    }

    fn summary(self) -> WriteSummary {
        WriteSummary {
            length: self.length,
            sha256: self.hasher.finalize().into(),
        }
    }
}

impl Write for HashingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.out.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.length += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

pub(crate) fn copy_to_folder(dir: &Path, path: &str, resource: &Resource) -> ArchiveResult<()> {
    if path.ends_with(EMPTY_MARKER) {
        return Ok(());
    }
    let target = dir.join(path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&target)?;
    resource.write(&mut file).map_err(|e| e.in_resource(path))
}

fn subtree_keys<V>(map: &BTreeMap<String, V>, prefix: &str) -> Vec<String> {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(k, _)| k.starts_with(prefix))
        .filter(|(k, _)| in_subtree(k, prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

/// Split a raw extra field into `(id, data)` records
fn decode_extra(extra: &str) -> ArchiveResult<Vec<(u16, Vec<u8>)>> {
    let bytes = BASE64
        .decode(extra)
        .map_err(|e| ArchiveError::InvalidArgument(format!("extra field: {e}")))?;
    let mut records = Vec::new();
    let mut rest = bytes.as_slice();
    while rest.len() >= 4 {
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let length = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        let Some(data) = rest.get(4..4 + length) else {
            break;
        };
        records.push((id, data.to_vec()));
        rest = &rest[4 + length..];
    }
    Ok(records)
}

/// Streams entries into a ZIP writer, synthesizing each parent directory
/// once before the first entry inside it
struct EntryWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    written_dirs: HashSet<String>,
    method: CompressionMethod,
    output_time: Option<i64>,
    dir_time: zip::DateTime,
}

impl<W: Write + Seek> EntryWriter<W> {
    fn new(sink: W, compression: Compression, output_time: Option<i64>, archive_time: i64) -> Self {
        let method = match compression {
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Store => CompressionMethod::Stored,
        };
        Self {
            zip: ZipWriter::new(sink),
            written_dirs: HashSet::new(),
            method,
            output_time,
            dir_time: to_zip_time(output_time.unwrap_or(archive_time)),
        }
    }

    fn write_resource(&mut self, path: &str, resource: &Resource) -> ArchiveResult<()> {
        self.write_entry(path, resource).map_err(|e| e.in_resource(path))
    }

    fn write_entry(&mut self, path: &str, resource: &Resource) -> ArchiveResult<()> {
        self.create_directories(path)?;
        if path.ends_with(EMPTY_MARKER) {
            return Ok(());
        }
        let time = match self.output_time {
            Some(fixed) => fixed,
            None => match resource.last_modified() {
                0 => now_millis(),
                t => t,
            },
        };
        let mut options = FullFileOptions::default()
            .compression_method(self.method)
            .last_modified_time(to_zip_time(time))
            .large_file(!resource.is_computed() && resource.size()? >= u64::from(u32::MAX));
        if let Some(extra) = resource.extra() {
            for (id, data) in decode_extra(&extra)? {
                if MANAGED_EXTRA_IDS.contains(&id) {
                    continue;
                }
                options.add_extra_data(id, data.into_boxed_slice(), false)?;
            }
        }
        self.zip.start_file(path, options)?;
        resource.write(&mut self.zip)?;
        trace!(path, "wrote entry");
        Ok(())
    }

    fn create_directories(&mut self, path: &str) -> ArchiveResult<()> {
        let Some(index) = path.rfind('/') else {
            return Ok(());
        };
        if index == 0 {
            return Ok(());
        }
        let dir = &path[..index];
        if self.written_dirs.contains(dir) {
            return Ok(());
        }
        self.create_directories(dir)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(self.dir_time);
        self.zip.add_directory(format!("{dir}/"), options)?;
        self.written_dirs.insert(dir.to_string());
        Ok(())
    }

    fn finish(self) -> ArchiveResult<W> {
        Ok(self.zip.finish()?)
    }
}
