use anyhow::Result;
use clap::Parser;
use pkgspec::commands::{self, Config, ConfigOptions};
use pkgspec::lifecycle::LifecycleOptions;
use std::path::PathBuf;

/// pkgspec - build packages from RPM-style spec files
///
/// Parses a package build descriptor, checks its dependency constraints and
/// runs prepare, build, install, package and clean, producing
/// RPMS/<arch>/<name>-<version>-<release>.<arch>.tar.gz below the top directory.
///
/// Examples:
///   pkgspec build nodeconductor-plus.spec
///   pkgspec --inventory available.json check nodeconductor-plus.spec
///   pkgspec show ~/pkgspecbuild/RPMS/noarch/nodeconductor-plus-0.2.0-1.el7.noarch.tar.gz
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGSPEC_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Top directory of the build tree (default ~/pkgspecbuild)
    #[arg(long, env = "PKGSPEC_TOPDIR", value_name = "PATH", global = true)]
    topdir: Option<PathBuf>,

    /// Directory holding source archives (default <topdir>/SOURCES)
    #[arg(long, value_name = "PATH", global = true)]
    sources: Option<PathBuf>,

    /// JSON file listing available package versions
    #[arg(long, env = "PKGSPEC_INVENTORY", value_name = "FILE", global = true)]
    inventory: Option<PathBuf>,

    /// Command printing available versions of {name}, one per line
    #[arg(long, value_name = "CMD", global = true)]
    query_command: Option<String>,

    /// Define a macro, e.g. -D 'dist .el7'
    #[arg(short = 'D', long = "define", value_name = "'NAME VALUE'", global = true)]
    defines: Vec<String>,

    /// Do not check dependencies
    #[arg(long, global = true)]
    nodeps: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the full lifecycle and write the package artifact
    Build(BuildArgs),

    /// Check dependency constraints only
    Check(SpecArgs),

    /// Show a spec file summary, or the contents of an artifact
    Show(ShowArgs),

    /// Remove the staging root of a spec file
    Clean(SpecArgs),
}

#[derive(clap::Args, Debug)]
struct SpecArgs {
    /// Path to the spec file
    #[arg(value_name = "SPEC")]
    spec: PathBuf,
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Path to the spec file
    #[arg(value_name = "SPEC")]
    spec: PathBuf,

    /// Leave the staging root in place after the build
    #[arg(long)]
    keep_buildroot: bool,
}

#[derive(clap::Args, Debug)]
struct ShowArgs {
    /// Spec file or artifact
    #[arg(value_name = "SPEC|ARTIFACT")]
    path: PathBuf,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = ConfigOptions {
        topdir: cli.topdir,
        sources: cli.sources,
        inventory: cli.inventory,
        query_command: cli.query_command,
        defines: cli.defines,
        nodeps: cli.nodeps,
    };
    let config = Config::new(pkgspec::runtime::RealRuntime, options)?;

    match cli.command {
        Commands::Build(args) => {
            let options = LifecycleOptions {
                keep_buildroot: args.keep_buildroot,
            };
            commands::build(&config, &args.spec, options)?;
        }
        Commands::Check(args) => commands::check(&config, &args.spec)?,
        Commands::Show(args) => commands::show(&config, &args.path, args.json)?,
        Commands::Clean(args) => commands::clean(&config, &args.spec)?,
    }
    Ok(())
}
