//! Reproducible package artifacts.
//!
//! An artifact is a gzip-compressed tar whose payload is exactly the file
//! manifest. Package metadata travels as JSON in the gzip header comment.

use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::descriptor::Descriptor;
use crate::package::DependencySet;
use crate::runtime::{Runtime, entry_name, staged_path};
use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};

/// Metadata embedded in every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub license: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub requires: DependencySet,
}

impl ArtifactMetadata {
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        let meta = &descriptor.metadata;
        Self {
            name: meta.name.clone(),
            version: meta.version.clone(),
            release: meta.release.clone(),
            arch: meta.build_arch.clone(),
            license: meta.license.clone(),
            summary: meta.summary.clone(),
            url: meta.url.clone(),
            requires: descriptor.requires.clone(),
        }
    }

    /// Canonical JSON form. Field order is fixed, so equal metadata always
    /// serializes to the same bytes.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize artifact metadata")
    }
}

/// One payload entry of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactEntry {
    /// Entry name, the install path without its leading `/`.
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
    /// Target of a symlink entry, as stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Writes artifacts with normalized headers (mtime 0, uid/gid 0).
#[derive(Debug, Default)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    /// Bundle `manifest` (absolute install paths) from `staging_root` into
    /// `dest`. Every manifest path must exist below the staging root.
    /// Symlinks are stored as links with their target verbatim.
    #[tracing::instrument(skip(self, runtime, manifest, metadata, cleanup_ctx))]
    pub fn write<R: Runtime>(
        &self,
        runtime: &R,
        staging_root: &Path,
        manifest: &[PathBuf],
        metadata: &ArtifactMetadata,
        dest: &Path,
        cleanup_ctx: Option<SharedCleanupContext>,
    ) -> Result<()> {
        if manifest.is_empty() {
            bail!("File manifest is empty, nothing to package");
        }

        let mut staged = Vec::with_capacity(manifest.len());
        for install_path in manifest {
            let source = staged_path(staging_root, install_path).ok_or_else(|| {
                anyhow!(
                    "Manifest path {} is outside the staging root",
                    install_path.display()
                )
            })?;
            if !runtime.exists(&source) && !runtime.is_symlink(&source) {
                bail!(
                    "Manifest path {} is missing from staging root {:?}",
                    install_path.display(),
                    staging_root
                );
            }
            staged.push((entry_name(install_path), source));
        }

        if let Some(parent) = dest.parent() {
            runtime.create_dir_all(parent)?;
        }
        let guard = cleanup_ctx.map(|ctx| CleanupGuard::new(ctx, dest.to_path_buf()));

        let file = runtime
            .create_file(dest)
            .with_context(|| format!("Failed to create artifact {:?}", dest))?;
        let encoder = GzBuilder::new()
            .comment(metadata.to_json()?)
            .mtime(0)
            .write(file, Compression::default());
        let mut tar = Builder::new(encoder);

        for (name, source) in &staged {
            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            let appended = if runtime.is_symlink(source) {
                let target = runtime.read_link(source)?;
                header.set_mode(0o777);
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                tar.append_link(&mut header, name, &target)
            } else if runtime.is_dir(source) {
                header.set_mode(runtime.file_mode(source)?);
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                tar.append_data(&mut header, name, std::io::empty())
            } else {
                header.set_mode(runtime.file_mode(source)?);
                let mut contents = Vec::new();
                runtime
                    .open(source)?
                    .read_to_end(&mut contents)
                    .with_context(|| format!("Failed to read staged file {:?}", source))?;
                header.set_entry_type(EntryType::Regular);
                header.set_size(contents.len() as u64);
                tar.append_data(&mut header, name, contents.as_slice())
            };
            appended.with_context(|| format!("Failed to add {:?} to artifact", name))?;
            debug!("Packaged {:?}", name);
        }

        let encoder = tar.into_inner().context("Failed to finish artifact")?;
        let mut file = encoder.finish().context("Failed to compress artifact")?;
        file.flush()?;

        if let Some(guard) = guard {
            guard.success();
        }
        info!("Wrote {} entries to {:?}", staged.len(), dest);
        Ok(())
    }
}

fn open_artifact<R: Runtime>(
    runtime: &R,
    path: &Path,
) -> Result<Archive<GzDecoder<Box<dyn Read + Send>>>> {
    let file = runtime
        .open(path)
        .with_context(|| format!("Failed to open artifact {:?}", path))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Metadata embedded in an artifact's gzip header.
pub fn read_artifact_metadata<R: Runtime>(runtime: &R, path: &Path) -> Result<ArtifactMetadata> {
    let archive = open_artifact(runtime, path)?;
    let decoder = archive.into_inner();
    let comment = decoder
        .header()
        .and_then(|h| h.comment())
        .with_context(|| format!("{:?} carries no package metadata", path))?;
    serde_json::from_slice(comment)
        .with_context(|| format!("Invalid package metadata in {:?}", path))
}

/// Payload entries of an artifact, in archive order.
pub fn list_artifact<R: Runtime>(runtime: &R, path: &Path) -> Result<Vec<ArtifactEntry>> {
    let mut archive = open_artifact(runtime, path)?;
    let mut entries = Vec::new();
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read artifact {:?}", path))?
    {
        let entry = entry.with_context(|| format!("Corrupt entry in {:?}", path))?;
        let header = entry.header();
        entries.push(ArtifactEntry {
            path: entry.path()?.to_string_lossy().into_owned(),
            size: header.size()?,
            mode: header.mode()?,
            is_dir: header.entry_type() == EntryType::Directory,
            link: entry
                .link_name()?
                .map(|target| target.to_string_lossy().into_owned()),
        });
    }
    Ok(entries)
}
