//! Parsed package build descriptor.

use serde::{Deserialize, Serialize};

use super::changelog::Changelog;
use super::macros::MacroTable;
use crate::package::DependencySet;

/// Architecture tag of packages without compiled code.
pub const NOARCH: &str = "noarch";

/// Package identity, fixed once the descriptor is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub summary: Option<String>,
    pub version: String,
    pub release: String,
    pub license: Option<String>,
    pub url: Option<String>,
    /// Source archive reference as written (`Source0`), macros expanded.
    pub source0: Option<String>,
    pub build_arch: String,
}

impl PackageMetadata {
    /// `name-version`, the conventional source directory name.
    pub fn name_version(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `name-version-release`
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// `name-version-release.arch`
    pub fn nvra(&self) -> String {
        format!("{}.{}", self.nvr(), self.build_arch)
    }

    /// File name of the source archive: the last path or URL segment of `Source0`.
    pub fn source_file_name(&self) -> Option<&str> {
        let source = self.source0.as_deref()?;
        let name = source
            .split(['?', '#'])
            .next()
            .unwrap_or(source)
            .rsplit('/')
            .next()
            .unwrap_or(source);
        (!name.is_empty()).then_some(name)
    }
}

/// The `%setup` directive of `%prep`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetupDirective {
    /// `-n DIR`: name of the working directory, default `name-version`.
    pub dir_name: Option<String>,
    /// `-q`
    pub quiet: bool,
}

/// Lifecycle scripts, macros already expanded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scripts {
    /// `%prep` lines other than `%setup`, run after extraction.
    pub prep: String,
    pub build: String,
    pub install: String,
    pub clean: String,
}

/// How an entry of `%files` is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Doc,
    License,
    Config,
    Dir,
    Ghost,
}

/// One path line of `%files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub kind: FileKind,
}

/// Contents of the `%files` section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilesSpec {
    /// `-f FILE` lists generated by the install script, relative to the
    /// working directory.
    pub file_lists: Vec<String>,
    pub entries: Vec<FileEntry>,
}

/// A complete package build descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub metadata: PackageMetadata,
    pub requires: DependencySet,
    pub build_requires: DependencySet,
    pub description: String,
    pub setup: SetupDirective,
    pub scripts: Scripts,
    /// `None` when the descriptor has no `%files` section.
    pub files: Option<FilesSpec>,
    pub changelog: Changelog,
    pub macros: MacroTable,
}

impl Descriptor {
    /// Working directory name below the build directory.
    pub fn source_dir_name(&self) -> String {
        self.setup
            .dir_name
            .clone()
            .unwrap_or_else(|| self.metadata.name_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(source0: Option<&str>) -> PackageMetadata {
        PackageMetadata {
            name: "nodeconductor-plus".into(),
            summary: None,
            version: "0.2.0".into(),
            release: "1.el7".into(),
            license: Some("MIT".into()),
            url: None,
            source0: source0.map(String::from),
            build_arch: NOARCH.into(),
        }
    }

    #[test]
    fn test_name_forms() {
        let meta = metadata(None);
        assert_eq!(meta.name_version(), "nodeconductor-plus-0.2.0");
        assert_eq!(meta.nvr(), "nodeconductor-plus-0.2.0-1.el7");
        assert_eq!(meta.nvra(), "nodeconductor-plus-0.2.0-1.el7.noarch");
    }

    #[test]
    fn test_source_file_name() {
        assert_eq!(
            metadata(Some("nodeconductor-plus-0.2.0.tar.gz")).source_file_name(),
            Some("nodeconductor-plus-0.2.0.tar.gz")
        );
        assert_eq!(
            metadata(Some("https://example.com/dl/pkg-1.0.tar.gz?raw=1")).source_file_name(),
            Some("pkg-1.0.tar.gz")
        );
        assert_eq!(metadata(Some("https://example.com/")).source_file_name(), None);
        assert_eq!(metadata(None).source_file_name(), None);
    }
}
