//! Path helpers for mapping install paths into a staging root.
//!
//! Install paths are what a package will own once installed (`/usr/lib/foo`).
//! Staged paths are where those files live during a build
//! (`BUILDROOT/foo-1.0-1.noarch/usr/lib/foo`).

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is under `dir` by comparing normalized path components.
///
/// `/root/usr/../../etc/passwd` is NOT under `/root`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Map an install path (`/usr/lib/pkg/a.py`) to its location inside `staging_root`.
///
/// Returns `None` when the path would escape the staging root.
pub fn staged_path(staging_root: &Path, install_path: &Path) -> Option<PathBuf> {
    let relative: PathBuf = install_path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let staged = normalize_path(&staging_root.join(relative));

    if staged == normalize_path(staging_root) || !is_path_under(&staged, staging_root) {
        return None;
    }
    Some(staged)
}

/// Inverse of [`staged_path`]: the absolute install path of a file found
/// under `staging_root`.
///
/// Returns `None` if `staged` is not inside the staging root.
pub fn install_path(staging_root: &Path, staged: &Path) -> Option<PathBuf> {
    if !is_path_under(staged, staging_root) {
        return None;
    }
    let relative = pathdiff::diff_paths(normalize_path(staged), normalize_path(staging_root))?;
    if relative.as_os_str().is_empty() || relative.is_absolute() {
        return None;
    }
    Some(Path::new("/").join(relative))
}

/// Archive entry name for an install path: the path without its leading `/`.
pub fn entry_name(install_path: &Path) -> PathBuf {
    install_path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/usr/local/../bin")),
            PathBuf::from("/usr/bin")
        );
    }

    #[test]
    fn test_normalize_path_mixed_components() {
        assert_eq!(
            normalize_path(Path::new("/usr/./local/../bin/./tool")),
            PathBuf::from("/usr/bin/tool")
        );
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(
            normalize_path(Path::new("foo/bar/../baz")),
            PathBuf::from("foo/baz")
        );
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        // "/buildroot-x" shares a string prefix but not a component prefix
        assert!(!is_path_under(
            Path::new("/buildroot-x/usr"),
            Path::new("/buildroot")
        ));
    }

    #[test]
    fn test_is_path_under_traversal() {
        assert!(!is_path_under(
            Path::new("/buildroot/usr/../../etc/passwd"),
            Path::new("/buildroot")
        ));
        assert!(is_path_under(
            Path::new("/buildroot/usr/../lib/a.py"),
            Path::new("/buildroot")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_path_joins_absolute_install_path() {
        assert_eq!(
            staged_path(Path::new("/tmp/br"), Path::new("/usr/lib/pkg/a.py")),
            Some(PathBuf::from("/tmp/br/usr/lib/pkg/a.py"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_path_rejects_escape() {
        assert_eq!(
            staged_path(Path::new("/tmp/br"), Path::new("/../../etc/passwd")),
            None
        );
        assert_eq!(staged_path(Path::new("/tmp/br"), Path::new("/")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_install_path_round_trips_staged_path() {
        let root = Path::new("/tmp/br");
        let staged = staged_path(root, Path::new("/etc/pkg/settings.ini")).unwrap();
        assert_eq!(
            install_path(root, &staged),
            Some(PathBuf::from("/etc/pkg/settings.ini"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_path_outside_root() {
        assert_eq!(
            install_path(Path::new("/tmp/br"), Path::new("/tmp/other/a")),
            None
        );
        assert_eq!(install_path(Path::new("/tmp/br"), Path::new("/tmp/br")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_name_strips_root() {
        assert_eq!(
            entry_name(Path::new("/usr/lib/pkg/a.py")),
            PathBuf::from("usr/lib/pkg/a.py")
        );
    }
}
