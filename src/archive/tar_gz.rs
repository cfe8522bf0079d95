use crate::cleanup::SharedCleanupContext;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::io::Read;
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, extract_via_temp, safe_entry_path};

/// Extractor for `.tar.gz`, `.tgz` and uncompressed `.tar` source archives
pub struct TarGzExtractor;

impl TarGzExtractor {
    fn is_compressed(archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }
}

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        Self::is_compressed(archive_path) || name.ends_with(".tar")
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

impl TarGzExtractor {
    fn extract_impl<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        debug!("Extracting tar archive to {:?}...", extract_to);
        let file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
        let reader: Box<dyn Read> = if Self::is_compressed(archive_path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut archive = Archive::new(reader);

        extract_via_temp(runtime, extract_to, cleanup_ctx, |temp_dir| {
            let entries = archive
                .entries()
                .with_context(|| format!("Failed to read archive {:?}", archive_path))?;

            for entry in entries {
                let mut entry = entry
                    .with_context(|| format!("Failed to read entry of {:?}", archive_path))?;
                let raw_path = entry.path()?.into_owned();
                let Some(entry_path) = safe_entry_path(&raw_path) else {
                    debug!("Skipping entry with unsafe path {:?}", raw_path);
                    continue;
                };
                let full_path = temp_dir.join(&entry_path);

                match entry.header().entry_type() {
                    EntryType::Directory => runtime.create_dir_all(&full_path)?,
                    EntryType::Regular | EntryType::Continuous => {
                        if let Some(parent) = full_path.parent() {
                            runtime.create_dir_all(parent)?;
                        }
                        let mut dest_file = runtime.create_file(&full_path)?;
                        std::io::copy(&mut entry, &mut dest_file)
                            .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                        drop(dest_file);

                        #[cfg(unix)]
                        if let Ok(mode) = entry.header().mode()
                            && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                        {
                            debug!("Failed to set permissions on {:?}: {}", full_path, e);
                        }
                    }
                    EntryType::Symlink | EntryType::Link => {
                        warn!("Skipping link entry {:?}", entry_path);
                    }
                    // pax and GNU long-name headers are consumed by the tar crate
                    other => debug!("Skipping {:?} entry {:?}", other, entry_path),
                }
            }
            Ok(())
        })?;

        info!("Extracted {:?}", archive_path);
        Ok(())
    }
}
