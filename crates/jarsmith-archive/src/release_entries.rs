//! Per-release grouping of archive entries.

use crate::index::Zip;
use crate::jar::Jar;
use crate::jpms::{MIN_RELEASE, parse_versioned, versioned_path};
use crate::resource::Resource;
use jarsmith_core::ArchiveResult;
use std::collections::BTreeMap;

/// Entries of an archive split by release, 0 being the base tree.
///
/// Each release holds paths relative to its own root.
#[derive(Debug)]
pub struct ReleaseEntries {
    name: String,
    releases: BTreeMap<u32, Zip>,
}

impl ReleaseEntries {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut releases = BTreeMap::new();
        releases.insert(0, Zip::new(name.clone()));
        Self { name, releases }
    }

    /// Group the resources of `jar`; its manifest stays in the base tree
    pub fn from_jar(jar: &Jar) -> ArchiveResult<Self> {
        let mut entries = Self::new(jar.name());
        for (path, resource) in jar.resources()? {
            match parse_versioned(path) {
                Some((release, relative)) if release >= MIN_RELEASE => {
                    entries.put_resource(release, relative, resource.clone(), true)?;
                }
                _ => {
                    entries.put_resource(0, path, resource.clone(), true)?;
                }
            }
        }
        Ok(entries)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases present, ascending, base first
    pub fn releases(&self) -> impl Iterator<Item = u32> + '_ {
        self.releases.keys().copied()
    }

    pub fn entries(&self, release: u32) -> Option<&Zip> {
        self.releases.get(&release)
    }

    /// Store a resource in a release tree; releases below 9 go to the base
    pub fn put_resource(
        &mut self,
        release: u32,
        path: &str,
        resource: Resource,
        overwrite: bool,
    ) -> ArchiveResult<bool> {
        let release = if release < MIN_RELEASE { 0 } else { release };
        let name = &self.name;
        self.releases
            .entry(release)
            .or_insert_with(|| Zip::new(format!("{name}-{release}")))
            .put_resource(path, resource, overwrite)
    }

    /// Reassemble one archive with versioned paths
    pub fn to_jar(&self) -> ArchiveResult<Jar> {
        let mut jar = Jar::new(self.name.clone());
        jar.borrow_resources();
        for (release, zip) in &self.releases {
            for (path, resource) in zip.resources()? {
                jar.put_resource(&versioned_path(*release, Some(path)), resource.clone(), true)?;
            }
        }
        Ok(jar)
    }
}
