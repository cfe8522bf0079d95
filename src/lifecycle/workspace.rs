//! Build tree layout below the top directory.
//!
//! ```text
//! <topdir>/
//!   SOURCES/     source archives
//!   BUILD/       working directories, one per package (name-version)
//!   BUILDROOT/   staging roots, one per build (name-version-release.arch)
//!   RPMS/<arch>/ finished artifacts
//! ```

use anyhow::{Context, Result, anyhow, bail};
use std::path::{Component, Path, PathBuf};

use crate::descriptor::{Descriptor, MacroTable, PackageMetadata};
use crate::runtime::{Runtime, is_path_under};

const DEFAULT_BUILDROOT: &str =
    "%{_topdir}/BUILDROOT/%{name}-%{version}-%{release}.%{_build_arch}";

#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    topdir: PathBuf,
    sources: PathBuf,
}

impl Workspace {
    /// `sources` defaults to `<topdir>/SOURCES`.
    pub fn new(topdir: PathBuf, sources: Option<PathBuf>) -> Self {
        let sources = sources.unwrap_or_else(|| topdir.join("SOURCES"));
        Self { topdir, sources }
    }

    pub fn topdir(&self) -> &Path {
        &self.topdir
    }

    pub fn sources_dir(&self) -> &Path {
        &self.sources
    }

    pub fn build_dir(&self) -> PathBuf {
        self.topdir.join("BUILD")
    }

    pub fn buildroot_dir(&self) -> PathBuf {
        self.topdir.join("BUILDROOT")
    }

    pub fn rpms_dir(&self) -> PathBuf {
        self.topdir.join("RPMS")
    }

    /// Define the layout macros unless the caller already did (`--define`).
    ///
    /// `buildroot` is stored unexpanded; it resolves once the descriptor has
    /// defined `name`, `version` and `release`.
    pub fn seed_macros(&self, macros: &mut MacroTable) {
        let layout = [
            ("_topdir", self.topdir.clone()),
            ("_sourcedir", self.sources.clone()),
            ("_builddir", self.build_dir()),
            ("_rpmdir", self.rpms_dir()),
        ];
        for (name, path) in layout {
            if !macros.is_defined(name) {
                macros.define(name, path.to_string_lossy());
            }
        }
        if !macros.is_defined("buildroot") {
            macros.define("buildroot", DEFAULT_BUILDROOT);
        }
    }

    /// `BUILD/<dir>`, where `<dir>` is `%setup -n` or `name-version`.
    ///
    /// `<dir>` must be a single plain path component, so the working
    /// directory is always strictly inside `BUILD`.
    pub fn working_dir(&self, descriptor: &Descriptor) -> Result<PathBuf> {
        let name = descriptor.source_dir_name();
        let mut components = Path::new(&name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.trim().is_empty() && !name.contains('%') => {
                Ok(self.build_dir().join(name))
            }
            _ => bail!(
                "Working directory name '{}' must be a single directory inside {:?}",
                name,
                self.build_dir()
            ),
        }
    }

    /// The staging root the install script writes into: the expanded
    /// `buildroot` macro, which must stay inside the top directory.
    pub fn staging_root(&self, descriptor: &Descriptor) -> Result<PathBuf> {
        let root = match descriptor.macros.get("buildroot") {
            Some(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
            _ => self.buildroot_dir().join(descriptor.metadata.nvra()),
        };
        if root.to_string_lossy().contains('%') {
            bail!("Unresolved macro in buildroot {:?}", root);
        }
        if !root.is_absolute() || !is_path_under(&root, &self.topdir) || root == self.topdir {
            bail!(
                "Staging root {:?} must be a directory inside {:?}",
                root,
                self.topdir
            );
        }
        Ok(root)
    }

    /// `RPMS/<arch>/<name>-<version>-<release>.<arch>.tar.gz`
    pub fn artifact_path(&self, metadata: &PackageMetadata) -> PathBuf {
        self.rpms_dir()
            .join(&metadata.build_arch)
            .join(format!("{}.tar.gz", metadata.nvra()))
    }

    /// Location of the `Source0` archive in the sources directory.
    pub fn source_archive(&self, descriptor: &Descriptor) -> Result<PathBuf> {
        let file_name = descriptor.metadata.source_file_name().ok_or_else(|| {
            anyhow!(
                "{} declares no usable Source0",
                descriptor.metadata.name
            )
        })?;
        Ok(self.sources.join(file_name))
    }

    /// Create the directory skeleton.
    pub fn ensure<R: Runtime>(&self, runtime: &R) -> Result<()> {
        for dir in [
            self.sources.clone(),
            self.build_dir(),
            self.buildroot_dir(),
            self.rpms_dir(),
        ] {
            runtime
                .create_dir_all(&dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parse_descriptor;
    use crate::runtime::MockRuntime;

    const DESCRIPTOR: &str = "\
Name: nodeconductor-plus
Version: 0.2.0
Release: 1%{?dist}
Source0: https://example.com/nodeconductor-plus-%{version}.tar.gz
";

    fn workspace() -> Workspace {
        Workspace::new(PathBuf::from("/top"), None)
    }

    fn descriptor(ws: &Workspace, defines: &[(&str, &str)]) -> Descriptor {
        let mut macros = MacroTable::new();
        for (name, value) in defines {
            macros.define(*name, *value);
        }
        ws.seed_macros(&mut macros);
        parse_descriptor(DESCRIPTOR, macros).unwrap()
    }

    #[test]
    fn test_layout() {
        let ws = Workspace::new(PathBuf::from("/top"), Some(PathBuf::from("/srv/sources")));
        assert_eq!(ws.sources_dir(), Path::new("/srv/sources"));
        assert_eq!(ws.build_dir(), PathBuf::from("/top/BUILD"));
        assert_eq!(workspace().sources_dir(), Path::new("/top/SOURCES"));
    }

    #[test]
    fn test_seeded_buildroot_resolves_after_parse() {
        let ws = workspace();
        let d = descriptor(&ws, &[("dist", ".el7")]);
        assert_eq!(
            ws.staging_root(&d).unwrap(),
            PathBuf::from("/top/BUILDROOT/nodeconductor-plus-0.2.0-1.el7.noarch")
        );
        assert_eq!(
            ws.working_dir(&d).unwrap(),
            PathBuf::from("/top/BUILD/nodeconductor-plus-0.2.0")
        );
    }

    #[test]
    fn test_working_dir_must_be_one_name_inside_build() {
        let ws = workspace();
        let mut d = descriptor(&ws, &[]);

        for bad in ["", "  ", "..", ".", "../..", "a/b", "/etc", "%{srcname}"] {
            d.setup.dir_name = Some(bad.to_string());
            let err = ws.working_dir(&d).unwrap_err();
            assert!(
                err.to_string().contains("must be a single directory"),
                "accepted {:?}",
                bad
            );
        }

        d.setup.dir_name = Some("nodeconductor_plus".to_string());
        assert_eq!(
            ws.working_dir(&d).unwrap(),
            PathBuf::from("/top/BUILD/nodeconductor_plus")
        );
    }

    #[test]
    fn test_defines_override_layout_macros() {
        let ws = workspace();
        let mut macros = MacroTable::new();
        macros.define("_sourcedir", "/elsewhere");
        ws.seed_macros(&mut macros);
        assert_eq!(macros.get("_sourcedir").as_deref(), Some("/elsewhere"));
        assert_eq!(macros.get("_topdir").as_deref(), Some("/top"));
    }

    #[test]
    fn test_staging_root_must_stay_in_topdir() {
        let ws = workspace();
        let d = descriptor(&ws, &[("buildroot", "/")]);
        assert!(ws.staging_root(&d).is_err());

        let d = descriptor(&ws, &[("buildroot", "/top/../etc")]);
        assert!(ws.staging_root(&d).is_err());

        let d = descriptor(&ws, &[("buildroot", "/top/BUILDROOT/custom")]);
        assert_eq!(
            ws.staging_root(&d).unwrap(),
            PathBuf::from("/top/BUILDROOT/custom")
        );
    }

    #[test]
    fn test_artifact_and_source_paths() {
        let ws = workspace();
        let d = descriptor(&ws, &[]);
        assert_eq!(
            ws.artifact_path(&d.metadata),
            PathBuf::from("/top/RPMS/noarch/nodeconductor-plus-0.2.0-1.noarch.tar.gz")
        );
        assert_eq!(
            ws.source_archive(&d).unwrap(),
            PathBuf::from("/top/SOURCES/nodeconductor-plus-0.2.0.tar.gz")
        );
    }

    #[test]
    fn test_ensure_creates_skeleton() {
        let mut runtime = MockRuntime::new();
        runtime.expect_create_dir_all().times(4).returning(|_| Ok(()));
        workspace().ensure(&runtime).unwrap();
    }
}
