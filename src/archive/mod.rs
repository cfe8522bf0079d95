//! Source archive extraction and artifact writing.
//!
//! Extractors unpack into a sibling temp directory first, then move the
//! contents into place, unwrapping a single top-level directory
//! (`pkg-1.0/setup.py` lands as `<dest>/setup.py`).

mod artifact;
mod tar_gz;
mod zip;

use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::runtime::Runtime;
use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::{Component, Path, PathBuf};

pub use artifact::{ArtifactEntry, ArtifactMetadata, ArtifactWriter, list_artifact, read_artifact_metadata};
pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Trait for format-specific archive extractors
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle the given archive format
    fn can_handle(&self, archive_path: &Path) -> bool;

    /// Extract the archive into `extract_to`, registering temporary paths
    /// with `cleanup_ctx` so a failed extraction can be undone
    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()>;
}

/// Dispatcher that selects the appropriate extractor based on archive format.
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
}

impl Default for ArchiveExtractorImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self {
            tar_gz: TarGzExtractor,
            zip: ZipExtractor,
        }
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, archive_path: &Path) -> bool {
        self.tar_gz.can_handle(archive_path) || self.zip.can_handle(archive_path)
    }

    #[tracing::instrument(skip(self, runtime, archive_path, extract_to, cleanup_ctx))]
    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        if self.tar_gz.can_handle(archive_path) {
            return self
                .tar_gz
                .extract_with_cleanup(runtime, archive_path, extract_to, cleanup_ctx);
        }
        if self.zip.can_handle(archive_path) {
            return self
                .zip
                .extract_with_cleanup(runtime, archive_path, extract_to, cleanup_ctx);
        }
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    }
}

/// Sibling scratch directory used while unpacking into `extract_to`.
pub(crate) fn temp_extract_dir(extract_to: &Path) -> Result<PathBuf> {
    let name = extract_to
        .file_name()
        .with_context(|| format!("Invalid extraction target {:?}", extract_to))?;
    Ok(extract_to.with_file_name(format!("{}_temp_extract", name.to_string_lossy())))
}

/// Reject entry paths that are absolute or climb out of the extraction root.
pub(crate) fn safe_entry_path(path: &Path) -> Option<PathBuf> {
    let mut safe = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => safe.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!safe.as_os_str().is_empty()).then_some(safe)
}

/// Unpack through a scratch directory: `unpack` fills the scratch directory,
/// then its contents are moved into `extract_to`. The scratch directory stays
/// registered with `cleanup_ctx` unless the move succeeds.
pub(crate) fn extract_via_temp<R, F>(
    runtime: &R,
    extract_to: &Path,
    cleanup_ctx: SharedCleanupContext,
    unpack: F,
) -> Result<()>
where
    R: Runtime,
    F: FnOnce(&Path) -> Result<()>,
{
    let temp_dir = temp_extract_dir(extract_to)?;
    if runtime.exists(&temp_dir) {
        runtime.remove_dir_all(&temp_dir)?;
    }
    runtime.create_dir_all(&temp_dir)?;

    let guard = CleanupGuard::new(cleanup_ctx, temp_dir.clone());

    debug!("Unpacking to temp dir: {:?}", temp_dir);
    unpack(&temp_dir)?;
    move_into_place(runtime, &temp_dir, extract_to)?;
    runtime.remove_dir_all(&temp_dir)?;

    guard.success();
    Ok(())
}

/// Move everything from the scratch directory into `extract_to`, unwrapping
/// a single top-level directory.
pub(crate) fn move_into_place<R: Runtime>(
    runtime: &R,
    temp_dir: &Path,
    extract_to: &Path,
) -> Result<()> {
    let entries = runtime
        .read_dir(temp_dir)
        .context("Failed to read temp extraction directory")?;

    let Some(first) = entries.first() else {
        return Err(anyhow!("Archive appears to be empty."));
    };

    let source_dir = if entries.len() == 1 && runtime.is_dir(first) {
        first.clone()
    } else {
        temp_dir.to_path_buf()
    };

    runtime.create_dir_all(extract_to)?;
    debug!("Moving contents from {:?} to {:?}", source_dir, extract_to);
    for item in runtime.read_dir(&source_dir)? {
        let file_name = item
            .file_name()
            .with_context(|| format!("Invalid extracted entry {:?}", item))?;
        runtime.rename(&item, &extract_to.join(file_name))?;
    }
    Ok(())
}
