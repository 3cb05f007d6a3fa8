//! Command line options for the git-migrator tool
use crate::{
    batch::BatchReport, config::GitMigratorConfig, errors::GitMigratorError,
    transport::TransportType, utils::main_migrate,
};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// git-migrator - Mirror git repositories from one host to another
#[derive(Parser, Deserialize, Default, Clone, Debug)]
#[command(version)]
pub struct GitMigratorCli {
    /// Base URL of the source host (e.g. 'https://github.com/example-user/')
    #[arg(short, long, visible_alias = "from", env = "GIT_MIGRATOR_ORIGIN_HOST")]
    pub origin_host: Option<String>,

    /// Base URL of the destination host (e.g. 'https://new-githost.com/example-user/')
    #[arg(short, long, visible_alias = "to", env = "GIT_MIGRATOR_DEST_HOST")]
    pub dest_host: Option<String>,

    /// Repositories to migrate
    #[arg(short, long, num_args = 1..)]
    #[serde(default)]
    pub repos: Vec<String>,

    /// Clone and set the new remote, but don't push
    #[arg(long = "no-push")]
    #[serde(default)]
    pub no_push: bool,

    /// Keep the local mirrors after the migration
    #[arg(long = "no-clean")]
    #[serde(default)]
    pub no_clean: bool,

    /// Replace existing local mirrors instead of failing
    #[arg(short, long)]
    #[serde(default)]
    pub force: bool,

    /// Directory holding the local mirrors (default: a new temporary directory)
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Suffix appended to every repository URL (e.g. '.git')
    #[arg(long)]
    pub suffix: Option<String>,

    /// Transport used for clone and push
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportType>,

    /// Custom configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show the current config path
    #[arg(long)]
    #[serde(default)]
    pub show_config_path: bool,

    /// Verbose mode (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,
}

impl GitMigratorCli {
    /// Log level matching the verbosity
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Run the git-migrator tool with the provided command line options
///
/// Returns `None` when there was nothing to migrate (`--show-config-path`).
/// # Errors
/// Error if the configuration is invalid or the transport is unavailable
pub async fn git_migrator_main(
    args: GitMigratorCli,
) -> Result<Option<BatchReport>, GitMigratorError> {
    let config = GitMigratorConfig::try_new(args)?;
    if config.cli_args.show_config_path {
        println!("{}", config.config_path.display());
        return Ok(None);
    }
    main_migrate(config).await.map(Some)
}
