//! The package lifecycle: prepare, build, install, package, clean.
//!
//! [`Lifecycle`] runs the phases of one descriptor in fixed order. The first
//! failing phase aborts the rest; clean always runs afterwards.

mod error;
mod manifest;
mod phase;
mod workspace;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveExtractor, ArtifactMetadata, ArtifactWriter};
use crate::cleanup::{self, CleanupGuard, SharedCleanupContext};
use crate::descriptor::Descriptor;
use crate::package::{DependencyProvider, check_all};
use crate::runtime::{Runtime, ScriptInvocation, ScriptOutput};

pub use error::BuildError;
pub use manifest::FileManifest;
pub use phase::Phase;
pub use workspace::Workspace;

use error::script_failure;

/// Options for a lifecycle run
#[derive(Debug, Clone, Default)]
pub struct LifecycleOptions {
    /// Leave the staging root in place after the run
    pub keep_buildroot: bool,
}

/// Output of the build phase.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildArtifacts {
    pub working_dir: PathBuf,
    /// Captured stdout of `%build`
    pub log: String,
}

/// Runs the lifecycle of one descriptor inside a workspace.
pub struct Lifecycle<'a, R: Runtime, E: ArchiveExtractor> {
    runtime: &'a R,
    extractor: &'a E,
    workspace: &'a Workspace,
    descriptor: &'a Descriptor,
    options: LifecycleOptions,
    writer: ArtifactWriter,
    cleanup_ctx: SharedCleanupContext,
    entered: Vec<Phase>,
}

impl<'a, R: Runtime + 'static, E: ArchiveExtractor> Lifecycle<'a, R, E> {
    pub fn new(
        runtime: &'a R,
        extractor: &'a E,
        workspace: &'a Workspace,
        descriptor: &'a Descriptor,
        options: LifecycleOptions,
    ) -> Self {
        Self {
            runtime,
            extractor,
            workspace,
            descriptor,
            options,
            writer: ArtifactWriter::new(),
            cleanup_ctx: cleanup::new_shared(),
            entered: Vec::new(),
        }
    }

    /// Phases started so far, in order.
    pub fn phases(&self) -> &[Phase] {
        &self.entered
    }

    /// Check `Requires` and `BuildRequires` against `provider`.
    ///
    /// Every unsatisfied constraint is logged; the first one is returned.
    #[tracing::instrument(skip(self, provider))]
    pub fn check_dependencies<P: DependencyProvider + ?Sized>(&self, provider: &P) -> Result<()> {
        let unsatisfied = check_all(
            provider,
            &[&self.descriptor.build_requires, &self.descriptor.requires],
        )
        .context("Failed to query available packages")?;

        for missing in &unsatisfied {
            warn!("{}", missing);
        }
        match unsatisfied.into_iter().next() {
            Some(first) => Err(BuildError::from(first).into()),
            None => Ok(()),
        }
    }

    /// Check dependencies, then run every phase. Returns the artifact path.
    ///
    /// Clean runs after the other phases whether or not they succeeded,
    /// unless the staging root is to be kept. Its failures are only logged.
    #[tracing::instrument(skip(self, provider))]
    pub fn run<P: DependencyProvider + ?Sized>(&mut self, provider: &P) -> Result<PathBuf> {
        let staging_root = self.workspace.staging_root(self.descriptor)?;

        let result = self.run_phases(provider, &staging_root);

        if self.options.keep_buildroot {
            info!("Keeping staging root {:?}", staging_root);
        } else {
            self.clean(&staging_root);
        }
        result
    }

    fn run_phases<P: DependencyProvider + ?Sized>(
        &mut self,
        provider: &P,
        staging_root: &Path,
    ) -> Result<PathBuf> {
        self.check_dependencies(provider)?;

        let source = self
            .workspace
            .source_archive(self.descriptor)
            .map_err(|e| BuildError::Extraction(format!("{:#}", e)))?;
        let working_dir = self.prepare(&source)?;
        let artifacts = self.build(&working_dir)?;
        let manifest = self.install(&artifacts, staging_root)?;
        Ok(self.package(&manifest, staging_root)?)
    }

    /// Extract the source archive into the working directory and run the
    /// rest of `%prep`.
    #[tracing::instrument(skip(self))]
    pub fn prepare(&mut self, source_archive: &Path) -> Result<PathBuf, BuildError> {
        self.enter(Phase::Prepare);
        let working_dir = self
            .workspace
            .working_dir(self.descriptor)
            .map_err(|e| BuildError::Extraction(format!("{:#}", e)))?;

        if !self.runtime.exists(source_archive) {
            return Err(BuildError::Extraction(format!(
                "Source archive {:?} not found",
                source_archive
            )));
        }
        if !self.extractor.can_handle(source_archive) {
            return Err(BuildError::Extraction(format!(
                "Unsupported archive format: {}",
                source_archive.display()
            )));
        }

        let extracted = self.extract(source_archive, &working_dir);
        if let Err(e) = extracted {
            self.discard_partial();
            return Err(BuildError::Extraction(format!("{:#}", e)));
        }

        if !self.descriptor.scripts.prep.trim().is_empty() {
            let output = self
                .run_section(Phase::Prepare, &self.descriptor.scripts.prep, &working_dir, None)
                .map_err(|e| BuildError::Extraction(format!("{:#}", e)))?;
            if !output.success() {
                return Err(BuildError::Extraction(script_failure("prep", &output)));
            }
        }

        info!("Prepared {:?}", working_dir);
        Ok(working_dir)
    }

    fn extract(&self, source_archive: &Path, working_dir: &Path) -> Result<()> {
        if self.runtime.exists(working_dir) {
            debug!("Removing previous working directory {:?}", working_dir);
            self.runtime.remove_dir_all(working_dir)?;
        }
        self.runtime.create_dir_all(&self.workspace.build_dir())?;

        let guard = CleanupGuard::new(self.cleanup_ctx.clone(), working_dir.to_path_buf());
        self.extractor.extract_with_cleanup(
            self.runtime,
            source_archive,
            working_dir,
            self.cleanup_ctx.clone(),
        )?;
        guard.success();
        Ok(())
    }

    /// Run `%build` inside the working directory.
    #[tracing::instrument(skip(self))]
    pub fn build(&mut self, working_dir: &Path) -> Result<BuildArtifacts, BuildError> {
        self.enter(Phase::Build);
        let mut artifacts = BuildArtifacts {
            working_dir: working_dir.to_path_buf(),
            log: String::new(),
        };

        if self.descriptor.scripts.build.trim().is_empty() {
            debug!("Empty %build, nothing to do");
            return Ok(artifacts);
        }

        let output = self
            .run_section(Phase::Build, &self.descriptor.scripts.build, working_dir, None)
            .map_err(|e| BuildError::Build(format!("{:#}", e)))?;
        if !output.success() {
            return Err(BuildError::Build(script_failure("build", &output)));
        }

        artifacts.log = output.stdout;
        Ok(artifacts)
    }

    /// Populate a fresh staging root with `%install` and collect the manifest.
    #[tracing::instrument(skip(self, artifacts))]
    pub fn install(
        &mut self,
        artifacts: &BuildArtifacts,
        staging_root: &Path,
    ) -> Result<FileManifest, BuildError> {
        self.enter(Phase::Install);

        self.reset_staging_root(staging_root)
            .map_err(|e| BuildError::Install(format!("{:#}", e)))?;

        let output = self
            .run_section(
                Phase::Install,
                &self.descriptor.scripts.install,
                &artifacts.working_dir,
                Some(staging_root),
            )
            .map_err(|e| BuildError::Install(format!("{:#}", e)))?;
        if !output.success() {
            return Err(BuildError::Install(script_failure("install", &output)));
        }

        let manifest = FileManifest::collect(
            self.runtime,
            self.descriptor.files.as_ref(),
            &artifacts.working_dir,
            staging_root,
        )
        .map_err(|e| BuildError::Install(format!("{:#}", e)))?;

        info!("Installed {} file(s) into {:?}", manifest.len(), staging_root);
        Ok(manifest)
    }

    fn reset_staging_root(&self, staging_root: &Path) -> Result<()> {
        if self.runtime.exists(staging_root) {
            debug!("Removing stale staging root {:?}", staging_root);
            self.runtime.remove_dir_all(staging_root)?;
        }
        self.runtime
            .create_dir_all(staging_root)
            .with_context(|| format!("Failed to create staging root {:?}", staging_root))
    }

    /// Bundle the manifest into the artifact.
    #[tracing::instrument(skip(self, manifest))]
    pub fn package(
        &mut self,
        manifest: &FileManifest,
        staging_root: &Path,
    ) -> Result<PathBuf, BuildError> {
        self.enter(Phase::Package);
        if manifest.is_empty() {
            return Err(BuildError::Packaging(
                "No files to package: the manifest is empty".to_string(),
            ));
        }

        let artifact = self.workspace.artifact_path(&self.descriptor.metadata);
        let metadata = ArtifactMetadata::from_descriptor(self.descriptor);

        let written = self.writer.write(
            self.runtime,
            staging_root,
            manifest.paths(),
            &metadata,
            &artifact,
            Some(self.cleanup_ctx.clone()),
        );
        if let Err(e) = written {
            self.discard_partial();
            return Err(BuildError::Packaging(format!("{:#}", e)));
        }

        info!("Wrote {:?}", artifact);
        Ok(artifact)
    }

    /// Run `%clean` (best effort) and remove the staging root.
    ///
    /// Succeeds when there is nothing to remove, so it can be called any
    /// number of times.
    #[tracing::instrument(skip(self))]
    pub fn clean(&mut self, staging_root: &Path) {
        self.enter(Phase::Clean);

        if !self.descriptor.scripts.clean.trim().is_empty() {
            let build_dir = self.workspace.build_dir();
            let cwd = if self.runtime.is_dir(&build_dir) {
                build_dir
            } else {
                self.workspace.topdir().to_path_buf()
            };
            match self.run_section(
                Phase::Clean,
                &self.descriptor.scripts.clean,
                &cwd,
                Some(staging_root),
            ) {
                Ok(output) if !output.success() => {
                    warn!("%clean failed: {}", script_failure("clean", &output).trim())
                }
                Ok(_) => {}
                Err(e) => warn!("%clean failed: {:#}", e),
            }
        }

        if self.runtime.exists(staging_root)
            && let Err(e) = self.runtime.remove_dir_all(staging_root)
        {
            warn!("Failed to remove staging root {:?}: {:#}", staging_root, e);
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!("Executing %{}", phase);
        self.entered.push(phase);
    }

    fn discard_partial(&self) {
        if let Ok(mut ctx) = self.cleanup_ctx.lock() {
            ctx.cleanup(self.runtime);
        }
    }

    fn run_section(
        &self,
        phase: Phase,
        script: &str,
        cwd: &Path,
        staging_root: Option<&Path>,
    ) -> Result<ScriptOutput> {
        let meta = &self.descriptor.metadata;
        let mut invocation = ScriptInvocation::new(script, cwd)
            .env("RPM_SOURCE_DIR", self.workspace.sources_dir().to_string_lossy())
            .env("RPM_BUILD_DIR", self.workspace.build_dir().to_string_lossy())
            .env("RPM_PACKAGE_NAME", &meta.name)
            .env("RPM_PACKAGE_VERSION", &meta.version)
            .env("RPM_PACKAGE_RELEASE", &meta.release)
            .env("RPM_ARCH", &meta.build_arch);
        if let Some(root) = staging_root {
            invocation = invocation
                .env("RPM_BUILD_ROOT", root.to_string_lossy())
                .env("buildroot", root.to_string_lossy());
        }

        let output = self.runtime.run_script(&invocation)?;
        if !output.stdout.is_empty() {
            debug!("%{} stdout:\n{}", phase.section().unwrap_or_default(), output.stdout);
        }
        Ok(output)
    }
}
