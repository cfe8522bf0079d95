use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::runtime::Runtime;

/// Tracks partially created paths (half-extracted sources, half-written
/// artifacts) that must not survive a failed phase.
#[derive(Default, Debug)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be cleaned up on failure
    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Remove a path from the cleanup list once the operation succeeded
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every registered path, newest first. Errors are logged, not returned.
    pub fn cleanup<R: Runtime>(&mut self, runtime: &R) {
        for path in self.paths.drain(..).rev() {
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(&path) {
                runtime.remove_dir_all(&path)
            } else if runtime.exists(&path) {
                runtime.remove_file(&path)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// RAII-style registration: the path stays registered unless [`CleanupGuard::success`]
/// is called.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    /// Create a new cleanup guard and register the path
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        if let Ok(mut guard) = ctx.lock() {
            guard.add(path.clone());
        }
        Self { ctx, path }
    }

    /// Mark the operation as successful, removing the path from cleanup
    pub fn success(self) {
        if let Ok(mut guard) = self.ctx.lock() {
            guard.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_context_add_remove() {
        let mut ctx = CleanupContext::new();
        let path = PathBuf::from("/tmp/test");

        ctx.add(path.clone());
        ctx.add(path.clone());
        assert_eq!(ctx.paths().len(), 1);

        ctx.remove(&path);
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_removes_files_and_dirs() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("artifact.tar.gz.part");
        let sub_dir = dir.path().join("pkg-1.0");
        fs::write(&file_path, "partial").unwrap();
        fs::create_dir(&sub_dir).unwrap();
        fs::write(sub_dir.join("setup.py"), "").unwrap();

        let mut ctx = CleanupContext::new();
        ctx.add(file_path.clone());
        ctx.add(sub_dir.clone());
        ctx.add(dir.path().join("never-created"));

        ctx.cleanup(&RealRuntime);

        assert!(!file_path.exists());
        assert!(!sub_dir.exists());
        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_failure_is_not_fatal() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_remove_dir_all()
            .times(2)
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let mut ctx = CleanupContext::new();
        ctx.add(PathBuf::from("/a"));
        ctx.add(PathBuf::from("/b"));
        ctx.cleanup(&runtime);

        assert!(ctx.paths().is_empty());
    }

    #[test]
    fn test_cleanup_guard_success() {
        let ctx = new_shared();
        let guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/tmp/test"));
        assert_eq!(ctx.lock().unwrap().paths().len(), 1);

        guard.success();
        assert!(ctx.lock().unwrap().paths().is_empty());
    }

    #[test]
    fn test_cleanup_guard_drop_without_success() {
        let ctx = new_shared();
        {
            let _guard = CleanupGuard::new(Arc::clone(&ctx), PathBuf::from("/tmp/test"));
        }
        assert_eq!(ctx.lock().unwrap().paths().len(), 1);
    }
}
