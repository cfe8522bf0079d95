//! The list of files a package owns.

use anyhow::{Context, Result, bail};
use glob::{MatchOptions, Pattern};
use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::descriptor::{FileEntry, FileKind, FilesSpec, parse_file_entries};
use crate::runtime::{Runtime, install_path, staged_path};

/// Absolute install paths in the order `%files` named them, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FileManifest {
    paths: Vec<PathBuf>,
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path; later duplicates are ignored.
    pub fn push(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Build the manifest of a populated staging root.
    ///
    /// Without a `%files` section every file below the root is included.
    /// Otherwise the generated `-f` lists (relative to `working_dir`) come
    /// first, followed by the explicit entries.
    #[tracing::instrument(skip(runtime, files))]
    pub fn collect<R: Runtime>(
        runtime: &R,
        files: Option<&FilesSpec>,
        working_dir: &Path,
        staging_root: &Path,
    ) -> Result<Self> {
        let mut manifest = Self::new();

        let Some(spec) = files else {
            debug!("No %files section, taking everything below {:?}", staging_root);
            manifest.extend_with_tree(runtime, staging_root, staging_root)?;
            return Ok(manifest);
        };

        for list in &spec.file_lists {
            let list_path = working_dir.join(list);
            let content = runtime
                .read_to_string(&list_path)
                .with_context(|| format!("Failed to read file list {:?}", list_path))?;
            let entries = parse_file_entries(&content)
                .with_context(|| format!("Invalid file list {:?}", list_path))?;
            for entry in &entries {
                manifest.add_entry(runtime, entry, staging_root)?;
            }
        }
        for entry in &spec.entries {
            manifest.add_entry(runtime, entry, staging_root)?;
        }

        Ok(manifest)
    }

    fn add_entry<R: Runtime>(
        &mut self,
        runtime: &R,
        entry: &FileEntry,
        staging_root: &Path,
    ) -> Result<()> {
        if entry.kind == FileKind::Ghost {
            debug!("Skipping %ghost {}", entry.path);
            return Ok(());
        }
        if !entry.path.starts_with('/') {
            // %doc README: copied from the working directory by rpm, not staged
            warn!("Skipping relative %files entry '{}'", entry.path);
            return Ok(());
        }

        if Pattern::escape(&entry.path) != entry.path {
            return self.add_pattern(runtime, &entry.path, staging_root);
        }

        let install = PathBuf::from(&entry.path);
        let Some(staged) = staged_path(staging_root, &install) else {
            bail!("File {} is outside the staging root", entry.path);
        };
        if runtime.is_symlink(&staged) {
            self.push(install);
            Ok(())
        } else if runtime.is_dir(&staged) && entry.kind != FileKind::Dir {
            self.extend_with_tree(runtime, staging_root, &staged)
        } else if runtime.exists(&staged) {
            self.push(install);
            Ok(())
        } else {
            bail!("File not found: {}", staged.display())
        }
    }

    /// Every staged file whose install path, or one of its parent
    /// directories, matches `pattern`.
    fn add_pattern<R: Runtime>(
        &mut self,
        runtime: &R,
        pattern: &str,
        staging_root: &Path,
    ) -> Result<()> {
        let compiled = Pattern::new(pattern)
            .with_context(|| format!("Invalid %files pattern '{}'", pattern))?;
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let before = self.len();
        for staged in runtime.walk_files(staging_root)? {
            let Some(install) = install_path(staging_root, &staged) else {
                continue;
            };
            if install
                .ancestors()
                .take_while(|p| *p != Path::new("/"))
                .any(|p| compiled.matches_path_with(p, options))
            {
                self.push(install);
            }
        }

        if self.len() == before {
            bail!("File not found by glob: {}", pattern);
        }
        Ok(())
    }

    fn extend_with_tree<R: Runtime>(
        &mut self,
        runtime: &R,
        staging_root: &Path,
        dir: &Path,
    ) -> Result<()> {
        for staged in runtime.walk_files(dir)? {
            if let Some(install) = install_path(staging_root, &staged) {
                self.push(install);
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FileManifest {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn stage(root: &Path, files: &[&str]) {
        for path in files {
            let full = root.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, path).unwrap();
        }
    }

    fn spec(lists: &[&str], body: &str) -> FilesSpec {
        FilesSpec {
            file_lists: lists.iter().map(|s| s.to_string()).collect(),
            entries: parse_file_entries(body).unwrap(),
        }
    }

    fn paths(manifest: &FileManifest) -> Vec<&str> {
        manifest
            .paths()
            .iter()
            .map(|p| p.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_push_deduplicates_keeping_first() {
        let mut manifest = FileManifest::new();
        manifest.push("/b".into());
        manifest.push("/a".into());
        manifest.push("/b".into());
        assert_eq!(paths(&manifest), vec!["/b", "/a"]);
    }

    #[test]
    fn test_without_files_section_takes_whole_tree() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        stage(&root, &["usr/bin/plus", "etc/plus.conf"]);

        let manifest = FileManifest::collect(&RealRuntime, None, dir.path(), &root)?;
        assert_eq!(paths(&manifest), vec!["/etc/plus.conf", "/usr/bin/plus"]);
        Ok(())
    }

    #[test]
    fn test_generated_file_list() -> Result<()> {
        let dir = tempdir()?;
        let work = dir.path().join("BUILD/pkg");
        let root = dir.path().join("root");
        stage(
            &root,
            &[
                "usr/lib/python2.7/site-packages/plus/__init__.py",
                "usr/lib/python2.7/site-packages/plus/__init__.pyc",
                "usr/lib/python2.7/site-packages/unlisted.py",
            ],
        );
        fs::create_dir_all(&work)?;
        fs::write(
            work.join("INSTALLED_FILES"),
            "/usr/lib/python2.7/site-packages/plus/__init__.py\n\
             /usr/lib/python2.7/site-packages/plus/__init__.pyc\n",
        )?;

        let manifest = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&["INSTALLED_FILES"], "")),
            &work,
            &root,
        )?;
        assert_eq!(
            paths(&manifest),
            vec![
                "/usr/lib/python2.7/site-packages/plus/__init__.py",
                "/usr/lib/python2.7/site-packages/plus/__init__.pyc",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_directories_expand_and_dir_directive_does_not() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        stage(&root, &["usr/share/plus/a.html", "usr/share/plus/sub/b.html"]);
        fs::create_dir_all(root.join("var/lib/plus"))?;

        let manifest = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&[], "%defattr(-,root,root)\n/usr/share/plus\n%dir /var/lib/plus\n")),
            dir.path(),
            &root,
        )?;
        assert_eq!(
            paths(&manifest),
            vec![
                "/usr/share/plus/a.html",
                "/usr/share/plus/sub/b.html",
                "/var/lib/plus",
            ]
        );
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_recorded_not_followed() -> Result<()> {
        use std::os::unix::fs::symlink;

        let dir = tempdir()?;
        let root = dir.path().join("root");
        stage(&root, &["usr/share/plus/static/app.js"]);
        fs::create_dir_all(root.join("usr/bin"))?;
        symlink("/usr/share/plus/static", root.join("usr/share/plus/assets"))?;
        symlink("/usr/lib/plus/manage.py", root.join("usr/bin/plus-manage"))?;

        let manifest = FileManifest::collect(
            &RealRuntime,
            Some(&spec(
                &[],
                "/usr/bin/plus-manage\n/usr/share/plus/assets\n/usr/share/plus\n",
            )),
            dir.path(),
            &root,
        )?;
        assert_eq!(
            paths(&manifest),
            vec![
                "/usr/bin/plus-manage",
                "/usr/share/plus/assets",
                "/usr/share/plus/static/app.js",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_glob_patterns_match_files_and_directories() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        stage(
            &root,
            &[
                "usr/lib/plus/models.py",
                "usr/lib/plus/views/index.py",
                "usr/lib/other/x.py",
            ],
        );

        let manifest = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&[], "/usr/lib/plus/*\n")),
            dir.path(),
            &root,
        )?;
        assert_eq!(
            paths(&manifest),
            vec!["/usr/lib/plus/models.py", "/usr/lib/plus/views/index.py"]
        );
        Ok(())
    }

    #[test]
    fn test_missing_entry_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        stage(&root, &["usr/bin/plus"]);

        let err = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&[], "/usr/bin/plus\n/usr/bin/missing\n")),
            dir.path(),
            &root,
        )
        .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_unmatched_glob_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        stage(&root, &["usr/bin/plus"]);

        let err = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&[], "/opt/*.py\n")),
            dir.path(),
            &root,
        )
        .unwrap_err();
        assert!(err.to_string().contains("File not found by glob"));
    }

    #[test]
    fn test_relative_doc_and_ghost_entries_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");
        stage(&root, &["usr/bin/plus"]);

        let manifest = FileManifest::collect(
            &RealRuntime,
            Some(&spec(
                &[],
                "%doc README.rst\n%ghost /var/log/plus.log\n/usr/bin/plus\n",
            )),
            dir.path(),
            &root,
        )?;
        assert_eq!(paths(&manifest), vec!["/usr/bin/plus"]);
        Ok(())
    }

    #[test]
    fn test_escaping_entry_fails() {
        let dir = tempdir().unwrap();
        let err = FileManifest::collect(
            &RealRuntime,
            Some(&spec(&[], "/../../etc/passwd\n")),
            dir.path(),
            &dir.path().join("root"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside the staging root"));
    }

    #[test]
    fn test_missing_file_list_names_path() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/top/BUILD/pkg/INSTALLED_FILES")))
            .returning(|_| Err(anyhow::anyhow!("No such file or directory")));

        let err = FileManifest::collect(
            &runtime,
            Some(&spec(&["INSTALLED_FILES"], "")),
            Path::new("/top/BUILD/pkg"),
            Path::new("/top/BUILDROOT/pkg"),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("INSTALLED_FILES"));
    }
}
