//! JAR manifest model.
//!
//! Parsing is lenient about line endings; writing always produces the same
//! bytes for the same content: `Manifest-Version` first, attributes sorted
//! case-insensitively, CRLF line ends, and lines folded at 72 bytes.

use jarsmith_core::{ArchiveError, ArchiveResult};
use std::collections::BTreeMap;
use std::io::{self, Write};

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const BUNDLE_SYMBOLICNAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const BND_LASTMODIFIED: &str = "Bnd-LastModified";
pub const AUTOMATIC_MODULE_NAME: &str = "Automatic-Module-Name";
pub const MULTI_RELEASE: &str = "Multi-Release";
pub const IMPORT_PACKAGE: &str = "Import-Package";
pub const REQUIRE_CAPABILITY: &str = "Require-Capability";
pub const BUNDLE_LOCALIZATION: &str = "Bundle-Localization";

const EOL: &[u8] = b"\r\n";
const MAX_LINE: usize = 72;

/// Attribute names compare case-insensitively; insertion order is kept.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sorted(&self) -> Vec<(&str, &str)> {
        let mut sorted: Vec<(&str, &str)> = self
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(MANIFEST_VERSION))
            .collect();
        sorted.sort_by(|a, b| {
            a.0.to_ascii_lowercase()
                .cmp(&b.0.to_ascii_lowercase())
                .then_with(|| a.0.cmp(b.0))
        });
        sorted
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Attributes {}

/// Main attributes plus named per-entry sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    sections: BTreeMap<String, Attributes>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest bytes
    pub fn parse(bytes: &[u8]) -> ArchiveResult<Self> {
        let mut manifest = Manifest::new();
        let mut current: Option<String> = None;
        let mut section = Attributes::new();
        let mut in_main = true;

        for (number, line) in logical_lines(bytes).into_iter().enumerate() {
            if line.is_empty() {
                if in_main {
                    manifest.main = std::mem::take(&mut section);
                    in_main = false;
                } else if let Some(name) = current.take() {
                    manifest.sections.insert(name, std::mem::take(&mut section));
                }
                continue;
            }
            let (key, value) = line.split_once(": ").ok_or_else(|| {
                ArchiveError::InvalidManifest(format!("line {}: missing ': ' in {line:?}", number + 1))
            })?;
            if !in_main && current.is_none() {
                if !key.eq_ignore_ascii_case("Name") {
                    return Err(ArchiveError::InvalidManifest(format!(
                        "section must start with Name, found {key}"
                    )));
                }
                current = Some(value.to_string());
                continue;
            }
            section.insert(key, value);
        }

        if in_main {
            manifest.main = section;
        } else if let Some(name) = current {
            manifest.sections.insert(name, section);
        }
        Ok(manifest)
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    pub fn section(&self, name: &str) -> Option<&Attributes> {
        self.sections.get(name)
    }

    /// The named section, created when missing
    pub fn section_mut(&mut self, name: &str) -> &mut Attributes {
        self.sections.entry(name.to_string()).or_default()
    }

    pub fn sections(&self) -> &BTreeMap<String, Attributes> {
        &self.sections
    }

    /// Bundle symbolic name without directives; `None` when absent or malformed
    pub fn bsn(&self) -> Option<String> {
        let raw = self.main.get(BUNDLE_SYMBOLICNAME)?;
        let name: String = raw
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .collect();
        (!name.is_empty()).then_some(name)
    }

    pub fn version(&self) -> Option<String> {
        self.main.get(BUNDLE_VERSION).map(|v| v.trim().to_string())
    }

    pub fn is_multi_release(&self) -> bool {
        self.main
            .get(MULTI_RELEASE)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Serialize in canonical form
    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        write_entry(out, MANIFEST_VERSION, "1.0")?;
        for (key, value) in self.main.sorted() {
            write_entry(out, key, &clean(value))?;
        }
        out.write_all(EOL)?;

        for (name, attributes) in &self.sections {
            write_entry(out, "Name", name)?;
            for (key, value) in attributes.sorted() {
                write_entry(out, key, &clean(value))?;
            }
            out.write_all(EOL)?;
        }
        out.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write(&mut out);
        out
    }
}

/// Join continuation lines; an empty string marks a section break.
///
/// Lines are joined as bytes before decoding, since folding may split a
/// multi-byte character.
fn logical_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines: Vec<Vec<u8>> = Vec::new();
    for raw in bytes.split(|b| *b == b'\n') {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(b" ") {
            if let Some(last) = lines.last_mut() {
                if !last.is_empty() {
                    last.extend_from_slice(rest);
                    continue;
                }
            }
        }
        lines.push(raw.to_vec());
    }
    while lines.last().is_some_and(Vec::is_empty) {
        lines.pop();
    }
    lines
        .iter()
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

fn write_entry(out: &mut dyn Write, name: &str, value: &str) -> io::Result<()> {
    let width = write_folded(out, 0, name)?;
    let width = write_folded(out, width, ": ")?;
    write_folded(out, width, value)?;
    out.write_all(EOL)
}

/// Write `text`, breaking lines before a character that would not fit
fn write_folded(out: &mut dyn Write, width: usize, text: &str) -> io::Result<usize> {
    let mut width = width;
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let encoded = c.encode_utf8(&mut buf).as_bytes();
        if width + encoded.len() > MAX_LINE - EOL.len() {
            out.write_all(EOL)?;
            out.write_all(b" ")?;
            width = 1;
        }
        out.write_all(encoded)?;
        width += encoded.len();
    }
    Ok(width)
}

/// Replace each run of NUL, CR and LF with a single space
fn clean(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut replaced_previous = false;
    for c in value.chars() {
        if matches!(c, '\0' | '\r' | '\n') {
            if !replaced_previous {
                out.push(' ');
                replaced_previous = true;
            }
        } else {
            replaced_previous = false;
            out.push(c);
        }
    }
    out
}
