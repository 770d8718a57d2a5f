//! Multi-Release JAR layering.
//!
//! Resources under `META-INF/versions/<N>/` belong to release `N` and
//! shadow the same relative path in the base tree for runtimes at release
//! `N` or later. Release 0 stands for the base tree.

use crate::jar::{Jar, MODULE_INFO_CLASS};
use crate::manifest::{AUTOMATIC_MODULE_NAME, IMPORT_PACKAGE, Manifest, REQUIRE_CAPABILITY};
use crate::module_info::parse_module_info;
use crate::resource::Resource;
use jarsmith_core::ArchiveResult;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tracing::debug;

pub const VERSIONS_PATH: &str = "META-INF/versions";
pub const MULTI_RELEASE_HEADER: &str = crate::manifest::MULTI_RELEASE;
/// Supplemental manifest consulted by OSGi frameworks per release
pub const OSGI_VERSIONED_MANIFEST_PATH: &str = "OSGI-INF/MANIFEST.MF";
/// First release that may carry versioned entries
pub const MIN_RELEASE: u32 = 9;
/// Highest release understood when classifying versioned directories
pub const MAX_SUPPORTED_RELEASE: u32 = 25;

/// Split a versioned path into its release and relative path.
///
/// `META-INF/versions/11/a/B.class` gives `(11, "a/B.class")`.
pub fn parse_versioned(path: &str) -> Option<(u32, &str)> {
    let rest = path.strip_prefix(VERSIONS_PATH)?.strip_prefix('/')?;
    let (number, relative) = rest.split_once('/')?;
    if number.is_empty() || relative.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((number.parse().ok()?, relative))
}

/// Path of `path` inside the tree of `release`; releases below
/// [`MIN_RELEASE`] map to the base tree
pub fn versioned_path(release: u32, path: Option<&str>) -> String {
    match (release < MIN_RELEASE, path) {
        (true, Some(path)) => path.to_string(),
        (true, None) => String::new(),
        (false, Some(path)) => format!("{VERSIONS_PATH}/{release}/{path}"),
        (false, None) => format!("{VERSIONS_PATH}/{release}"),
    }
}

/// Turn an arbitrary name into a dotted module name
pub fn cleanup_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// A bundle archive viewed as a stack of release trees
pub struct JpmsModule {
    jar: Jar,
}

impl JpmsModule {
    pub fn new(jar: Jar) -> Self {
        Self { jar }
    }

    pub fn jar(&self) -> &Jar {
        &self.jar
    }

    pub fn jar_mut(&mut self) -> &mut Jar {
        &mut self.jar
    }

    pub fn into_jar(self) -> Jar {
        self.jar
    }

    /// Releases with at least one versioned resource, ascending
    pub fn versions(&self) -> ArchiveResult<BTreeSet<u32>> {
        let prefix = format!("{VERSIONS_PATH}/");
        Ok(self
            .jar
            .resources()?
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, _)| parse_versioned(path).map(|(release, _)| release))
            .filter(|release| (MIN_RELEASE..=MAX_SUPPORTED_RELEASE).contains(release))
            .collect())
    }

    /// Structural check: any versioned resource present
    pub fn has_versions(&self) -> ArchiveResult<bool> {
        Ok(!self.versions()?.is_empty())
    }

    /// The manifest's `Multi-Release` flag, regardless of layout
    pub fn is_multi_release(&self) -> ArchiveResult<bool> {
        Ok(self.jar.manifest()?.is_some_and(|m| m.is_multi_release()))
    }

    /// Exactly the resources of one release tree, re-rooted. The base tree
    /// (release below 9) excludes every versioned entry.
    pub fn release_only(&self, release: u32) -> ArchiveResult<Jar> {
        let mut only = Jar::new(format!("{}-{release}", self.jar.name()));
        only.inherit_settings(&self.jar);
        only.borrow_resources();
        for (path, resource) in self.jar.resources()? {
            match parse_versioned(path) {
                Some((r, relative)) if r == release && release >= MIN_RELEASE => {
                    only.put_resource(relative, resource.clone(), true)?;
                }
                None if release < MIN_RELEASE && !is_versions_tree(path) => {
                    if path != self.jar.manifest_name() {
                        only.put_resource(path, resource.clone(), true)?;
                    }
                }
                _ => {}
            }
        }
        Ok(only)
    }

    /// The base tree overlaid with every release up to `release`, lower
    /// releases first
    pub fn release(&self, release: u32) -> ArchiveResult<Jar> {
        let mut merged = self.release_only(0)?;
        merged.set_name(format!("{}-{release}", self.jar.name()));
        for r in self.versions()?.into_iter().filter(|r| *r <= release) {
            let layer = self.release_only(r)?;
            for (path, resource) in layer.resources()? {
                merged.put_resource(path, resource.clone(), true)?;
            }
        }
        Ok(merged)
    }

    pub fn put_resource(
        &mut self,
        release: u32,
        path: &str,
        resource: Resource,
        overwrite: bool,
    ) -> ArchiveResult<bool> {
        self.jar
            .put_resource(&versioned_path(release, Some(path)), resource, overwrite)
    }

    /// The resource stored at `path` in exactly one release tree
    pub fn resource(&self, release: u32, path: &str) -> ArchiveResult<Option<Resource>> {
        self.jar.get_resource(&versioned_path(release, Some(path)))
    }

    /// Point lookup across release trees.
    ///
    /// With release 0 the base is searched first, then every release
    /// ascending. Otherwise the nearest release at or below `release` is
    /// searched first, descending to the base.
    pub fn find_resource(&self, path: &str, release: u32) -> ArchiveResult<Option<Resource>> {
        let versions = self.versions()?;
        let order: Vec<u32> = if release == 0 {
            std::iter::once(0).chain(versions).collect()
        } else {
            versions
                .into_iter()
                .filter(|r| *r <= release)
                .rev()
                .chain(std::iter::once(0))
                .collect()
        };
        for r in order {
            if let Some(resource) = self.resource(r, path)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    /// The manifest as an OSGi framework at `release` sees it.
    ///
    /// A supplemental manifest at `OSGI-INF/MANIFEST.MF` in a release tree
    /// contributes only `Import-Package` and `Require-Capability`.
    pub fn manifest(&self, release: u32) -> ArchiveResult<Manifest> {
        let base = self.jar.manifest()?.unwrap_or_default();
        if release < MIN_RELEASE {
            return Ok(base);
        }
        let supplemental = self
            .versions()?
            .into_iter()
            .filter(|r| *r <= release)
            .rev()
            .find_map(|r| self.resource(r, OSGI_VERSIONED_MANIFEST_PATH).transpose())
            .transpose()?;
        let Some(supplemental) = supplemental else {
            return Ok(base);
        };
        let supplemental = Manifest::parse(&supplemental.read_all()?)?;
        let mut derived = base;
        for header in [IMPORT_PACKAGE, REQUIRE_CAPABILITY] {
            let main = derived.main_attributes_mut();
            match supplemental.main_attributes().get(header) {
                Some(value) => main.insert(header, value),
                None => {
                    main.remove(header);
                }
            }
        }
        Ok(derived)
    }

    /// The first release above `release` that has versioned resources,
    /// `u32::MAX` when there is none
    pub fn next_release(&self, release: u32) -> ArchiveResult<u32> {
        Ok(self
            .versions()?
            .into_iter()
            .find(|r| *r > release)
            .unwrap_or(u32::MAX))
    }

    /// Module name at `release`: the nearest module descriptor, else
    /// `Automatic-Module-Name`
    pub fn module_name(&self, release: u32) -> ArchiveResult<Option<String>> {
        if let Some(descriptor) = self.find_resource(MODULE_INFO_CLASS, release)? {
            if let Some(info) = parse_module_info(&descriptor.read_all()?)? {
                return Ok(Some(info.name));
            }
        }
        Ok(self
            .manifest(release)?
            .main_attributes()
            .get(AUTOMATIC_MODULE_NAME)
            .map(|v| v.trim().to_string()))
    }

    pub fn module_version(&self, release: u32) -> ArchiveResult<Option<String>> {
        match self.find_resource(MODULE_INFO_CLASS, release)? {
            Some(descriptor) => Ok(parse_module_info(&descriptor.read_all()?)?.and_then(|i| i.version)),
            None => Ok(None),
        }
    }
}

fn is_versions_tree(path: &str) -> bool {
    jarsmith_core::path::in_subtree(path, VERSIONS_PATH)
}

/// Flattening of Multi-Release archives
pub struct MultiReleaseJars;

impl MultiReleaseJars {
    /// A plain archive holding, for every relative path, the resource of the
    /// highest release not above `release`.
    ///
    /// Release 0 means no limit; releases 1 to 8 select the base tree only.
    /// Versioned trees outside 9 to 25 are ignored, as in [`JpmsModule::versions`].
    /// Resources are shared with `jar`, never copied.
    pub fn view(jar: &Jar, release: u32) -> ArchiveResult<Jar> {
        let limit = match release {
            0 => u32::MAX,
            r if r < MIN_RELEASE => 0,
            r => r,
        };
        let mut chosen: BTreeMap<&str, (u32, &Resource)> = BTreeMap::new();
        for (path, resource) in jar.resources()? {
            let (r, relative) = match parse_versioned(path) {
                Some((r, _)) if !(MIN_RELEASE..=MAX_SUPPORTED_RELEASE).contains(&r) || r > limit => {
                    continue;
                }
                Some((r, relative)) => (r, relative),
                None => (0, path.as_str()),
            };
            match chosen.get(relative) {
                Some((existing, _)) if *existing >= r => {}
                _ => {
                    chosen.insert(relative, (r, resource));
                }
            }
        }

        let mut view = Jar::new(jar.name());
        view.inherit_settings(jar);
        view.borrow_resources();
        view.set_manifest_name(jar.manifest_name())?;
        for (relative, (_, resource)) in &chosen {
            view.put_resource(relative, (*resource).clone(), true)?;
        }
        if !view.exists(jar.manifest_name())? {
            if let Some(manifest) = jar.manifest()? {
                view.set_manifest(manifest)?;
            }
        }
        debug!(jar = %jar.name(), release, entries = chosen.len(), "flattened multi-release view");
        Ok(view)
    }
}
