//! Runtime abstraction for system operations.
//!
//! Every phase goes through [`Runtime`] for filesystem access, home directory
//! lookups and child processes, so phase logic can be unit tested against
//! `MockRuntime`.
//!
//! # Structure
//!
//! - `path` - Staging-root path mapping (staged_path, install_path, entry_name)
//! - `env` - Home directory and privilege information
//! - `fs` - File system operations (read, directory, permissions, tree walk)
//! - `process` - Shell script execution for lifecycle phases
//! - `symlink` - Symlink inspection (is_symlink, read_link)

mod env;
mod fs;
pub mod path;
mod process;
mod symlink;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use path::{entry_name, install_path, is_path_under, staged_path};
pub use process::{ScriptInvocation, ScriptOutput};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // File System
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn is_dir(&self, path: &Path) -> bool;

    /// Set file permissions (mode) on Unix systems. No-op on Windows.
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    /// Permission bits of a file. Always `0o644` on Windows.
    fn file_mode(&self, path: &Path) -> Result<u32>;

    /// All non-directory entries below `root`, sorted by path. Symlinks are
    /// listed, never followed.
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    // Symlinks
    fn is_symlink(&self, path: &Path) -> bool;
    fn read_link(&self, path: &Path) -> Result<PathBuf>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;

    // Privilege
    fn is_privileged(&self) -> bool;

    // Processes
    /// Run a shell script to completion, capturing its output.
    /// A non-zero exit is reported through [`ScriptOutput`], not as an `Err`.
    fn run_script(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        self.open_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        self.set_permissions_impl(path, mode)
    }

    fn file_mode(&self, path: &Path) -> Result<u32> {
        self.file_mode_impl(path)
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        self.walk_files_impl(root)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.is_symlink_impl(path)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.read_link_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn is_privileged(&self) -> bool {
        self.is_privileged_impl()
    }

    fn run_script(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        self.run_script_impl(invocation)
    }
}
