//! Lazily materialized archive content.
//!
//! A [`Resource`] is a cheap, cloneable handle to one unit of content. The
//! backing store is one of a closed set of [`Source`] variants; content is
//! read at most once and then cached until [`Resource::close`] releases it.

use crate::Jar;
use crate::generator::{CommandContent, ConcatContent, PropertiesContent, SharedProperties};
use crate::timestamp::system_time_millis;
use bytes::{Buf, Bytes};
use jarsmith_core::{ArchiveError, ArchiveResult};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;
use url::Url;
use zip::ZipArchive;

/// Default size above which file resources are streamed instead of buffered
pub const DEFAULT_BUFFER_LIMIT: u64 = 64 * 1024 * 1024;

/// An open archive file shared by every entry read from it.
///
/// The enclosing archive index owns the handle and empties it on close.
pub type SharedZipFile = Arc<Mutex<Option<ZipArchive<File>>>>;

/// Content produced on demand at write time.
pub trait ContentGenerator: Send + Sync {
    /// Write the content to the sink
    fn generate(&self, out: &mut dyn Write) -> ArchiveResult<()>;

    /// Short description for diagnostics
    fn describe(&self) -> String;
}

/// A cloneable handle to lazily materialized content
#[derive(Clone)]
pub struct Resource {
    inner: Arc<Inner>,
}

struct Inner {
    source: Source,
    state: Mutex<State>,
}

struct State {
    content: Content,
    last_modified: i64,
    extra: Option<String>,
}

enum Content {
    Pending,
    Loaded(Bytes),
    Closed,
}

enum Source {
    File {
        path: PathBuf,
        limit: u64,
    },
    Buffer,
    Url(Url),
    ZipEntry {
        archive: SharedZipFile,
        index: usize,
        name: String,
        size: u64,
    },
    NestedArchive {
        jar: Arc<Mutex<Jar>>,
        close_inner: bool,
    },
    Computed(Arc<dyn ContentGenerator>),
}

impl Resource {
    fn with_source(source: Source, content: Content, last_modified: i64) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(State {
                    content,
                    last_modified,
                    extra: None,
                }),
            }),
        }
    }

    /// Content held in memory
    pub fn from_bytes(bytes: impl Into<Bytes>, last_modified: i64) -> Self {
        Self::with_source(Source::Buffer, Content::Loaded(bytes.into()), last_modified)
    }

    /// Content of a file, buffered up to [`DEFAULT_BUFFER_LIMIT`]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::from_file_with_limit(path, DEFAULT_BUFFER_LIMIT)
    }

    /// Content of a file; files larger than `limit` bytes are never buffered.
    ///
    /// The file is not required to exist yet. A missing file surfaces as an
    /// I/O error when the content is first read.
    pub fn from_file_with_limit(path: impl Into<PathBuf>, limit: u64) -> Self {
        let path = path.into();
        let last_modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(system_time_millis)
            .unwrap_or(0);
        Self::with_source(Source::File { path, limit }, Content::Pending, last_modified)
    }

    /// Content fetched from a URL (`file:`, `http:` or `https:`)
    pub fn from_url(url: Url, last_modified: i64) -> Self {
        Self::with_source(Source::Url(url), Content::Pending, last_modified)
    }

    pub(crate) fn from_zip_entry(
        archive: SharedZipFile,
        index: usize,
        name: String,
        size: u64,
        last_modified: i64,
    ) -> Self {
        Self::with_source(
            Source::ZipEntry {
                archive,
                index,
                name,
                size,
            },
            Content::Pending,
            last_modified,
        )
    }

    /// The serialized form of a nested archive.
    ///
    /// With `close_inner`, closing this resource also closes the nested
    /// archive.
    pub fn from_jar(jar: Jar, close_inner: bool) -> Self {
        let last_modified = jar.last_modified();
        Self::with_source(
            Source::NestedArchive {
                jar: Arc::new(Mutex::new(jar)),
                close_inner,
            },
            Content::Pending,
            last_modified,
        )
    }

    /// Standard output of a shell command, run in `working_dir` at write time
    pub fn command(
        command: impl Into<String>,
        working_dir: impl AsRef<Path>,
        last_modified: i64,
    ) -> Self {
        Self::computed(
            Arc::new(CommandContent::new(command.into(), working_dir.as_ref())),
            last_modified,
        )
    }

    /// `.properties` serialization of a shared map, taken at write time
    pub fn properties(properties: SharedProperties, last_modified: i64) -> Self {
        Self::computed(Arc::new(PropertiesContent::new(properties)), last_modified)
    }

    /// The content of several resources, one after the other
    pub fn concat(parts: Vec<Resource>) -> Self {
        let last_modified = parts.iter().map(Resource::last_modified).max().unwrap_or(0);
        Self::computed(Arc::new(ConcatContent::new(parts)), last_modified)
    }

    /// Content produced by a generator every time it is written
    pub fn computed(generator: Arc<dyn ContentGenerator>, last_modified: i64) -> Self {
        Self::with_source(Source::Computed(generator), Content::Pending, last_modified)
    }

    /// Returns the content, reading the backing store on first use.
    ///
    /// Every call returns an independent view of the same bytes. `None`
    /// means the content is not buffered: generated content, or a file
    /// above its buffer limit. Use [`Resource::open_input_stream`] or
    /// [`Resource::write`] for those.
    pub fn buffer(&self) -> ArchiveResult<Option<Bytes>> {
        let mut state = self.inner.state.lock();
        match &state.content {
            Content::Loaded(bytes) => return Ok(Some(bytes.clone())),
            Content::Closed => return Ok(Some(Bytes::new())),
            Content::Pending => {}
        }
        let Some(loaded) = self.inner.load()? else {
            return Ok(None);
        };
        trace!(resource = %self.inner.source, bytes = loaded.len(), "materialized");
        state.content = Content::Loaded(loaded.clone());
        Ok(Some(loaded))
    }

    /// A stream over the content
    pub fn open_input_stream(&self) -> ArchiveResult<Box<dyn Read + Send>> {
        if let Some(bytes) = self.buffer()? {
            return Ok(Box::new(bytes.reader()));
        }
        self.inner.stream()
    }

    /// Copy the content to a sink. Safe to call repeatedly.
    pub fn write(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        if let Source::Computed(generator) = &self.inner.source {
            if self.is_closed() {
                return Ok(());
            }
            return generator.generate(out);
        }
        match self.buffer()? {
            Some(bytes) => out.write_all(&bytes)?,
            None => {
                let mut input = self.open_input_stream()?;
                io::copy(&mut input, out)?;
            }
        }
        Ok(())
    }

    /// Content length in bytes
    pub fn size(&self) -> ArchiveResult<u64> {
        {
            let state = self.inner.state.lock();
            match &state.content {
                Content::Loaded(bytes) => return Ok(bytes.len() as u64),
                Content::Closed => return Ok(0),
                Content::Pending => {}
            }
        }
        match &self.inner.source {
            Source::File { path, .. } => Ok(fs::metadata(path).map_err(|e| with_path(e, path))?.len()),
            Source::ZipEntry { size, .. } => Ok(*size),
            _ => Ok(self.read_all()?.len() as u64),
        }
    }

    /// The whole content, buffered or not
    pub fn read_all(&self) -> ArchiveResult<Bytes> {
        if let Some(bytes) = self.buffer()? {
            return Ok(bytes);
        }
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(Bytes::from(out))
    }

    /// Epoch milliseconds; 0 when the time is not authoritative
    pub fn last_modified(&self) -> i64 {
        self.inner.state.lock().last_modified
    }

    /// Metadata carried from and to the ZIP extra field, base64 encoded
    pub fn extra(&self) -> Option<String> {
        self.inner.state.lock().extra.clone()
    }

    pub fn set_extra(&self, extra: Option<String>) {
        self.inner.state.lock().extra = extra;
    }

    /// Returns true for content generated at write time
    pub fn is_computed(&self) -> bool {
        matches!(self.inner.source, Source::Computed(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner.state.lock().content, Content::Closed)
    }

    pub(crate) fn file_path(&self) -> Option<&Path> {
        match &self.inner.source {
            Source::File { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns true when both handles refer to the same resource
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Release cached content. Further reads see empty content.
    ///
    /// Shared backing stores stay open; a nested archive is closed only when
    /// the resource was created with `close_inner`.
    pub fn close(&self) {
        let was_closed = {
            let mut state = self.inner.state.lock();
            let was_closed = matches!(state.content, Content::Closed);
            state.content = Content::Closed;
            was_closed
        };
        if was_closed {
            return;
        }
        if let Source::NestedArchive {
            jar,
            close_inner: true,
        } = &self.inner.source
        {
            jar.lock().close();
        }
    }
}

impl Inner {
    /// A stream over content that [`Inner::load`] declined to buffer
    fn stream(&self) -> ArchiveResult<Box<dyn Read + Send>> {
        match &self.source {
            Source::File { path, .. } => {
                let file = File::open(path).map_err(|e| with_path(e, path))?;
                Ok(Box::new(file))
            }
            Source::Computed(generator) => {
                let mut out = Vec::new();
                generator.generate(&mut out)?;
                Ok(Box::new(Cursor::new(out)))
            }
            Source::Buffer | Source::Url(_) | Source::ZipEntry { .. } | Source::NestedArchive { .. } => {
                Err(ArchiveError::unavailable(format!("{} cannot be streamed unbuffered", self.source)))
            }
        }
    }

    fn load(&self) -> ArchiveResult<Option<Bytes>> {
        match &self.source {
            Source::File { path, limit } => {
                let length = fs::metadata(path).map_err(|e| with_path(e, path))?.len();
                if length > *limit {
                    return Ok(None);
                }
                let bytes = fs::read(path).map_err(|e| with_path(e, path))?;
                Ok(Some(Bytes::from(bytes)))
            }
            Source::Buffer => Ok(Some(Bytes::new())),
            Source::Url(url) => fetch_url(url).map(Some),
            Source::ZipEntry {
                archive,
                index,
                name,
                ..
            } => read_zip_entry(archive, *index, name).map(Some),
            Source::NestedArchive { jar, .. } => {
                let mut out = Vec::new();
                jar.lock().write(&mut out)?;
                Ok(Some(Bytes::from(out)))
            }
            Source::Computed(_) => Ok(None),
        }
    }
}

fn with_path(error: io::Error, path: &Path) -> ArchiveError {
    ArchiveError::Io(io::Error::new(
        error.kind(),
        format!("{}: {error}", path.display()),
    ))
}

fn fetch_url(url: &Url) -> ArchiveResult<Bytes> {
    if url.scheme() == "file" {
        let path = url
            .to_file_path()
            .map_err(|()| ArchiveError::InvalidArgument(format!("not a local file URL: {url}")))?;
        let bytes = fs::read(&path).map_err(|e| with_path(e, &path))?;
        return Ok(Bytes::from(bytes));
    }
    let response = ureq::get(url.as_str()).call().map_err(|err| match err {
        ureq::Error::Status(code, _response) => {
            ArchiveError::unavailable(format!("server returned status {code} for {url}"))
        }
        ureq::Error::Transport(transport) => {
            ArchiveError::unavailable(format!("transport error for {url}: {transport}"))
        }
    })?;
    let mut out = Vec::new();
    response.into_reader().read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

fn read_zip_entry(archive: &SharedZipFile, index: usize, name: &str) -> ArchiveResult<Bytes> {
    let mut guard = archive.lock();
    let zip = guard
        .as_mut()
        .ok_or_else(|| ArchiveError::unavailable(format!("archive closed before reading {name}")))?;
    let mut entry = zip.by_index(index)?;
    let mut out = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File { path, .. } => write!(f, "file {}", path.display()),
            Source::Buffer => write!(f, "buffer"),
            Source::Url(url) => write!(f, "url {url}"),
            Source::ZipEntry { name, .. } => write!(f, "zip entry {name}"),
            Source::NestedArchive { .. } => write!(f, "nested archive"),
            Source::Computed(generator) => write!(f, "computed {}", generator.describe()),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("source", &self.inner.source.to_string())
            .field("last_modified", &self.last_modified())
            .finish()
    }
}
