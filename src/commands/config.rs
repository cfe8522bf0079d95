use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::{
    archive::{ArchiveExtractor, ArchiveExtractorImpl},
    descriptor::{Descriptor, MacroTable},
    lifecycle::Workspace,
    package::{DependencyProvider, Inventory, Permissive, QueryCommand},
    runtime::Runtime,
};

/// Name of the default top directory below the home directory.
const DEFAULT_TOPDIR_NAME: &str = "pkgspecbuild";

/// Settings collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub topdir: Option<PathBuf>,
    pub sources: Option<PathBuf>,
    pub inventory: Option<PathBuf>,
    pub query_command: Option<String>,
    /// `NAME VALUE` macro definitions
    pub defines: Vec<String>,
    pub nodeps: bool,
}

/// Where dependency availability comes from.
#[derive(Debug)]
pub enum Availability {
    Inventory(Inventory),
    Query(String),
    /// `--nodeps`, or nothing configured
    Unchecked,
}

pub struct Config<R: Runtime, E: ArchiveExtractor> {
    pub runtime: R,
    pub extractor: E,
    pub workspace: Workspace,
    pub macros: MacroTable,
    pub availability: Availability,
}

impl<R: Runtime> Config<R, ArchiveExtractorImpl> {
    pub fn new(runtime: R, options: ConfigOptions) -> Result<Self> {
        let topdir = match options.topdir {
            Some(path) => path,
            None => default_topdir(&runtime)?,
        };
        debug!("Using top directory {:?}", topdir);
        let workspace = Workspace::new(topdir, options.sources);

        let mut macros = MacroTable::new();
        for define in &options.defines {
            if !macros.define_from_line(define) {
                bail!("Invalid macro definition '{}', expected 'NAME VALUE'", define);
            }
        }
        workspace.seed_macros(&mut macros);

        let availability = if options.nodeps {
            Availability::Unchecked
        } else if let Some(path) = &options.inventory {
            Availability::Inventory(Inventory::load(&runtime, path)?)
        } else if let Some(command) = options.query_command {
            Availability::Query(command)
        } else {
            warn!("No --inventory or --query-command given, dependencies will not be checked");
            Availability::Unchecked
        };

        Ok(Self {
            runtime,
            extractor: ArchiveExtractorImpl::new(),
            workspace,
            macros,
            availability,
        })
    }
}

impl<R: Runtime, E: ArchiveExtractor> Config<R, E> {
    /// Parse a descriptor with the configured macros.
    pub fn load_descriptor(&self, path: &Path) -> Result<Descriptor> {
        Descriptor::load(&self.runtime, path, self.macros.clone())
    }

    /// The dependency provider for this run.
    pub fn provider(&self) -> Box<dyn DependencyProvider + '_> {
        match &self.availability {
            Availability::Inventory(inventory) => Box::new(inventory.clone()),
            Availability::Query(command) => {
                Box::new(QueryCommand::new(&self.runtime, command.clone(), Path::new(".")))
            }
            Availability::Unchecked => Box::new(Permissive),
        }
    }
}

/// `~/pkgspecbuild`
#[tracing::instrument(skip(runtime))]
pub fn default_topdir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(DEFAULT_TOPDIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn runtime_with_home() -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_home_dir()
            .returning(|| Some(PathBuf::from("/home/user")));
        runtime
    }

    #[test]
    fn test_default_topdir_under_home() {
        let config = Config::new(runtime_with_home(), ConfigOptions::default()).unwrap();
        assert_eq!(
            config.workspace.topdir(),
            Path::new("/home/user/pkgspecbuild")
        );
        assert_eq!(
            config.macros.get("_sourcedir").as_deref(),
            Some("/home/user/pkgspecbuild/SOURCES")
        );
        assert!(matches!(config.availability, Availability::Unchecked));
    }

    #[test]
    fn test_no_home_dir_is_an_error() {
        let mut runtime = MockRuntime::new();
        runtime.expect_home_dir().returning(|| None);
        let err = Config::new(runtime, ConfigOptions::default()).err().unwrap();
        assert!(err.to_string().contains("home directory"));
    }

    #[test]
    fn test_defines_are_applied_before_layout() {
        let options = ConfigOptions {
            topdir: Some(PathBuf::from("/build")),
            defines: vec!["dist .el7".into(), "_sourcedir /srv/src".into()],
            ..Default::default()
        };
        let config = Config::new(MockRuntime::new(), options).unwrap();
        assert_eq!(config.macros.get("dist").as_deref(), Some(".el7"));
        assert_eq!(config.macros.get("_sourcedir").as_deref(), Some("/srv/src"));
        assert_eq!(config.macros.get("_topdir").as_deref(), Some("/build"));
    }

    #[test]
    fn test_invalid_define() {
        let options = ConfigOptions {
            topdir: Some(PathBuf::from("/build")),
            defines: vec!["novalue".into()],
            ..Default::default()
        };
        let err = Config::new(MockRuntime::new(), options).err().unwrap();
        assert!(err.to_string().contains("Invalid macro definition 'novalue'"));
    }

    #[test]
    fn test_inventory_is_loaded() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/etc/inventory.json")))
            .returning(|_| Ok(r#"{"nodeconductor": ["0.110.0"]}"#.to_string()));
        let options = ConfigOptions {
            topdir: Some(PathBuf::from("/build")),
            inventory: Some(PathBuf::from("/etc/inventory.json")),
            ..Default::default()
        };

        let config = Config::new(runtime, options).unwrap();
        let versions = config.provider().available_versions("nodeconductor").unwrap();
        assert_eq!(versions, vec!["0.110.0".parse().unwrap()]);
    }

    #[test]
    fn test_nodeps_wins_over_inventory() {
        let options = ConfigOptions {
            topdir: Some(PathBuf::from("/build")),
            inventory: Some(PathBuf::from("/etc/inventory.json")),
            nodeps: true,
            ..Default::default()
        };
        let config = Config::new(MockRuntime::new(), options).unwrap();
        assert!(!config.provider().is_authoritative());
    }
}
