use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::{
    archive::ArchiveExtractor,
    lifecycle::{Lifecycle, LifecycleOptions},
    runtime::Runtime,
};

use super::config::Config;

/// Run the whole lifecycle of a descriptor and return the artifact path.
#[tracing::instrument(skip(config, options))]
pub fn build<R: Runtime + 'static, E: ArchiveExtractor>(
    config: &Config<R, E>,
    spec_path: &Path,
    options: LifecycleOptions,
) -> Result<PathBuf> {
    let descriptor = config.load_descriptor(spec_path)?;
    info!("Building {}", descriptor.metadata.nvra());

    if config.runtime.is_privileged() {
        warn!("Building packages as root; a faulty %install script can damage the system");
    }

    config.workspace.ensure(&config.runtime)?;
    let provider = config.provider();
    let mut lifecycle = Lifecycle::new(
        &config.runtime,
        &config.extractor,
        &config.workspace,
        &descriptor,
        options,
    );
    let artifact = lifecycle.run(provider.as_ref())?;

    println!("Wrote: {}", artifact.display());
    Ok(artifact)
}
