//! Sources of "which versions of a package are available".

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::version::Version;
use crate::runtime::{Runtime, ScriptInvocation};

/// Answers which versions of a named package are available.
#[cfg_attr(test, mockall::automock)]
pub trait DependencyProvider {
    /// Available versions of `name`; empty if the package is unknown.
    fn available_versions(&self, name: &str) -> Result<Vec<Version>>;

    /// False for providers that cannot answer, in which case checks are skipped.
    fn is_authoritative(&self) -> bool {
        true
    }
}

/// Provider backed by a JSON inventory file mapping names to versions:
///
/// ```json
/// { "nodeconductor": ["0.109.0", "0.110.0"], "python-setuptools": ["0.9.8"] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    packages: BTreeMap<String, Vec<Version>>,
}

impl Inventory {
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(content).context("Failed to parse inventory JSON")?;
        let mut packages = BTreeMap::new();
        for (name, versions) in raw {
            let versions = versions
                .iter()
                .map(|v| {
                    v.parse::<Version>()
                        .with_context(|| format!("Invalid version for '{}' in inventory", name))
                })
                .collect::<Result<Vec<_>>>()?;
            packages.insert(name, versions);
        }
        Ok(Self { packages })
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read inventory {:?}", path))?;
        let inventory = Self::from_json(&content)?;
        debug!(
            "Loaded inventory with {} package(s) from {:?}",
            inventory.packages.len(),
            path
        );
        Ok(inventory)
    }

    pub fn insert(&mut self, name: impl Into<String>, version: Version) {
        self.packages.entry(name.into()).or_default().push(version);
    }
}

impl DependencyProvider for Inventory {
    fn available_versions(&self, name: &str) -> Result<Vec<Version>> {
        Ok(self.packages.get(name).cloned().unwrap_or_default())
    }
}

/// Provider that asks an external command, e.g.
/// `rpm -q --qf '%{VERSION}-%{RELEASE}\n' {name}`.
///
/// `{name}` is replaced by the package name. Each non-empty stdout line is a
/// version; a non-zero exit means the package is not available.
pub struct QueryCommand<'a, R: Runtime> {
    runtime: &'a R,
    template: String,
    cwd: PathBuf,
}

impl<'a, R: Runtime> QueryCommand<'a, R> {
    pub fn new(runtime: &'a R, template: impl Into<String>, cwd: &Path) -> Self {
        Self {
            runtime,
            template: template.into(),
            cwd: cwd.to_path_buf(),
        }
    }

    fn command_for(&self, name: &str) -> String {
        self.template.replace("{name}", name)
    }
}

impl<R: Runtime> DependencyProvider for QueryCommand<'_, R> {
    fn available_versions(&self, name: &str) -> Result<Vec<Version>> {
        let command = self.command_for(name);
        debug!("Querying availability of '{}': {}", name, command);
        let output = self
            .runtime
            .run_script(&ScriptInvocation::new(command, &self.cwd))?;

        if !output.success() {
            debug!(
                "Query for '{}' exited with {}: {}",
                name,
                output.code(),
                output.stderr.trim()
            );
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for line in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.parse::<Version>() {
                Ok(version) => versions.push(version),
                Err(e) => warn!("Ignoring unparsable version '{}' for '{}': {}", line, name, e),
            }
        }
        Ok(versions)
    }
}

/// Provider used with `--nodeps`: never consulted.
pub struct Permissive;

impl DependencyProvider for Permissive {
    fn available_versions(&self, _name: &str) -> Result<Vec<Version>> {
        Ok(Vec::new())
    }

    fn is_authoritative(&self) -> bool {
        false
    }
}
