//! Content generated at write time.

use crate::resource::{ContentGenerator, Resource};
use jarsmith_core::{ArchiveError, ArchiveResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Properties shared between their owner and a resource serializing them
pub type SharedProperties = Arc<RwLock<BTreeMap<String, String>>>;

/// Standard output of a shell command
pub(crate) struct CommandContent {
    command: String,
    working_dir: PathBuf,
}

impl CommandContent {
    pub(crate) fn new(command: String, working_dir: &Path) -> Self {
        Self {
            command,
            working_dir: working_dir.to_path_buf(),
        }
    }

    fn shell(&self) -> Command {
        let mut shell = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        shell.arg(&self.command).current_dir(&self.working_dir);
        shell
    }
}

impl ContentGenerator for CommandContent {
    fn generate(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        debug!(command = %self.command, dir = %self.working_dir.display(), "running command resource");
        let output = self.shell().output()?;
        if !output.status.success() {
            return Err(ArchiveError::Command {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        out.write_all(&output.stdout)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }
}

/// `.properties` serialization, one `key=value` line per entry in key order
pub(crate) struct PropertiesContent {
    properties: SharedProperties,
}

impl PropertiesContent {
    pub(crate) fn new(properties: SharedProperties) -> Self {
        Self { properties }
    }
}

impl ContentGenerator for PropertiesContent {
    fn generate(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        let properties = self.properties.read();
        for (key, value) in properties.iter() {
            let line = format!("{}={}\n", escape(key, true), escape(value, false));
            out.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "properties".to_string()
    }
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Several resources written back to back
pub(crate) struct ConcatContent {
    parts: Vec<Resource>,
}

impl ConcatContent {
    pub(crate) fn new(parts: Vec<Resource>) -> Self {
        Self { parts }
    }
}

impl ContentGenerator for ConcatContent {
    fn generate(&self, out: &mut dyn Write) -> ArchiveResult<()> {
        for part in &self.parts {
            part.write(out)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("concatenation of {} resources", self.parts.len())
    }
}
