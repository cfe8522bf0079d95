use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

use super::{ArchiveExtractor, extract_via_temp};

/// Extractor for `.zip` source archives
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".zip")
    }

    fn extract_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        self.extract_impl(runtime, archive_path, extract_to, cleanup_ctx)
    }
}

impl ZipExtractor {
    fn extract_impl<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        debug!("Extracting zip archive to {:?}...", extract_to);
        let mut reader = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        // ZipArchive needs Read + Seek
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
        let mut archive =
            ZipArchive::new(Cursor::new(buffer)).context("Failed to parse ZIP archive")?;

        extract_via_temp(runtime, extract_to, cleanup_ctx, |temp_dir| {
            for i in 0..archive.len() {
                let mut entry = archive
                    .by_index(i)
                    .with_context(|| format!("Failed to read ZIP entry {}", i))?;

                let Some(entry_path) = entry.enclosed_name() else {
                    debug!("Skipping entry with unsafe path {:?}", entry.name());
                    continue;
                };
                let full_path = temp_dir.join(entry_path);

                if entry.is_dir() {
                    runtime.create_dir_all(&full_path)?;
                    continue;
                }
                if let Some(parent) = full_path.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut dest_file = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut dest_file)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;

                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode()
                    && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                {
                    debug!("Failed to set permissions on {:?}: {}", full_path, e);
                }
            }
            Ok(())
        })?;

        info!("Extracted {:?}", archive_path);
        Ok(())
    }
}
