//! Package rename pass

use jarsmith_archive::{Jar, Resource};
use jarsmith_core::path::{file_name, parent};
use jarsmith_core::{ArchiveError, ArchiveResult, Instruction};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Source tree mirrored next to the classes
pub const SOURCE_MIRROR: &str = "OSGI-OPT/src/";

/// Length of the hex digest used in derived prefixes
const HASH_PREFIX_LEN: usize = 12;

/// Rewrites type references inside one class file.
///
/// `rename` maps an internal class name such as `com/acme/Foo` to its new
/// name, or returns `None` when the class is not moved. Returning `Ok(None)`
/// means the class needs no change.
pub trait ClassRewriter: Send + Sync {
    fn rewrite(
        &self,
        path: &str,
        class: &[u8],
        rename: &dyn Fn(&str) -> Option<String>,
    ) -> ArchiveResult<Option<Vec<u8>>>;
}

/// Packages selected by an instruction, moved under a prefix.
///
/// Without an explicit prefix every package gets its own prefix derived
/// from the seed and the package name.
pub struct ShadeRule {
    pub packages: Box<dyn Instruction>,
    pub prefix: Option<String>,
}

impl ShadeRule {
    pub fn new(packages: impl Instruction + 'static) -> Self {
        Self {
            packages: Box::new(packages),
            prefix: None,
        }
    }

    /// Use a fixed dotted prefix such as `shaded.acme`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Input for derived prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadeSeed {
    Explicit(String),
    /// Bundle symbolic name and version, falling back to the archive name
    Identity,
}

impl ShadeSeed {
    fn resolve(&self, jar: &Jar) -> ArchiveResult<String> {
        match self {
            ShadeSeed::Explicit(seed) => Ok(seed.clone()),
            ShadeSeed::Identity => {
                let bsn = jar.bsn()?.unwrap_or_else(|| jar.name().to_string());
                let version = jar.version()?.unwrap_or_else(|| "0.0.0".to_string());
                Ok(format!("{bsn}-{version}"))
            }
        }
    }
}

/// Package moves computed for one archive, keyed by `/`-separated package path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadePlan {
    renames: BTreeMap<String, String>,
}

impl ShadePlan {
    pub fn renames(&self) -> &BTreeMap<String, String> {
        &self.renames
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// New name of a class or resource path whose directory is a moved package
    pub fn rename_path(&self, path: &str) -> Option<String> {
        let package = parent(path);
        self.renames
            .get(package)
            .map(|moved| format!("{moved}/{}", file_name(path)))
    }

    /// Like [`ShadePlan::rename_path`], also following the source mirror
    fn rename_entry(&self, path: &str) -> Option<String> {
        match path.strip_prefix(SOURCE_MIRROR) {
            Some(source) => self
                .rename_path(source)
                .map(|moved| format!("{SOURCE_MIRROR}{moved}")),
            None => self.rename_path(path),
        }
    }
}

/// Moves packages of an archive and rewrites the classes referring to them
pub struct Shader {
    rules: Vec<ShadeRule>,
    seed: ShadeSeed,
    rewriter: Box<dyn ClassRewriter>,
}

impl Shader {
    pub fn new(rewriter: Box<dyn ClassRewriter>, seed: ShadeSeed) -> Self {
        Self {
            rules: Vec::new(),
            seed,
            rewriter,
        }
    }

    /// Append a rule; the first rule matching a package decides its fate
    pub fn rule(mut self, rule: ShadeRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Compute the package moves without touching the archive
    pub fn plan(&self, jar: &Jar) -> ArchiveResult<ShadePlan> {
        let seed = self.seed.resolve(jar)?;
        let mut renames = BTreeMap::new();
        for package in jar.packages()? {
            let Some(rule) = self.rules.iter().find(|r| r.packages.matches(&package)) else {
                continue;
            };
            if rule.packages.is_negated() {
                continue;
            }
            let prefix = match &rule.prefix {
                Some(prefix) => prefix.trim_matches('.').to_string(),
                None => derived_prefix(&seed, &package),
            };
            let moved = format!("{prefix}.{package}");
            renames.insert(package.replace('.', "/"), moved.replace('.', "/"));
        }
        Ok(ShadePlan { renames })
    }

    /// Rewrite every class, then move every entry of a renamed package.
    ///
    /// Paths are renamed only after all content has been rewritten.
    pub fn apply(&self, jar: &mut Jar) -> ArchiveResult<ShadePlan> {
        let plan = self.plan(jar)?;
        if plan.is_empty() {
            return Ok(plan);
        }
        let rename_class = |name: &str| plan.rename_path(name);

        let classes = jar.resource_names(|p| p.ends_with(".class"))?;
        let mut rewritten = 0usize;
        for path in &classes {
            let Some(resource) = jar.get_resource(path)? else {
                continue;
            };
            let bytes = resource.read_all()?;
            let updated = self
                .rewriter
                .rewrite(path, &bytes, &rename_class)
                .map_err(|e| match e {
                    rewrite @ ArchiveError::Rewrite { .. } => rewrite,
                    other => ArchiveError::Rewrite {
                        path: path.clone(),
                        message: other.to_string(),
                    },
                })?;
            if let Some(updated) = updated {
                trace!(path = %path, "rewrote class");
                jar.put_resource(path, Resource::from_bytes(updated, resource.last_modified()), true)?;
                rewritten += 1;
            }
        }

        let moves: Vec<(String, String)> = jar
            .resource_names(|_| true)?
            .into_iter()
            .filter_map(|path| plan.rename_entry(&path).map(|moved| (path, moved)))
            .collect();
        for (from, to) in &moves {
            jar.rename(from, to)?;
        }
        for package in plan.renames().keys().rev() {
            prune_if_empty(jar, package)?;
            prune_if_empty(jar, &format!("{SOURCE_MIRROR}{package}"))?;
        }
        debug!(
            jar = %jar.name(),
            packages = plan.len(),
            classes = rewritten,
            moved = moves.len(),
            "shaded archive"
        );
        Ok(plan)
    }
}

/// Drop a vacated package directory that has no subdirectories
fn prune_if_empty(jar: &mut Jar, dir: &str) -> ArchiveResult<()> {
    let below = format!("{dir}/");
    let vacated = jar.directory(dir)?.is_some_and(|children| children.is_empty())
        && !jar.directories()?.keys().any(|k| k.starts_with(&below));
    if vacated {
        jar.remove_prefix(&below)?;
    }
    Ok(())
}

/// `s` followed by the first hex digits of SHA-256 over `seed:package`
fn derived_prefix(seed: &str, package: &str) -> String {
    let digest = Sha256::digest(format!("{seed}:{package}").as_bytes());
    let hex = hex::encode(digest);
    format!("s{}", &hex[..HASH_PREFIX_LEN])
}
