use anyhow::Result;
use std::path::Path;

use crate::{
    archive::ArchiveExtractor,
    lifecycle::{Lifecycle, LifecycleOptions},
    runtime::Runtime,
};

use super::config::Config;

/// Remove the staging root of a descriptor. Nothing to remove is not an error.
#[tracing::instrument(skip(config))]
pub fn clean<R: Runtime + 'static, E: ArchiveExtractor>(
    config: &Config<R, E>,
    spec_path: &Path,
) -> Result<()> {
    let descriptor = config.load_descriptor(spec_path)?;
    let staging_root = config.workspace.staging_root(&descriptor)?;

    let mut lifecycle = Lifecycle::new(
        &config.runtime,
        &config.extractor,
        &config.workspace,
        &descriptor,
        LifecycleOptions::default(),
    );
    lifecycle.clean(&staging_root);
    println!("Cleaned {}", staging_root.display());
    Ok(())
}
