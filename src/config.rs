//! Configuration handling
use std::{fs::read_to_string, path::PathBuf};

use home::home_dir;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    cli::GitMigratorCli,
    errors::{GitMigratorError, GitMigratorErrorKind},
    transport::TransportType,
};

/// Validated settings for one migration batch
///
/// Read-only for the whole run. Build it with [`MigrationConfig::new`] and the
/// builder methods, the orchestrator validates it before touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Base URL of the source host, concatenated with each repository name
    pub origin_host: String,

    /// Base URL of the destination host, concatenated with each repository name
    pub dest_host: String,

    /// Repositories to migrate, in processing order
    pub repos: Vec<String>,

    /// Clone and retarget only, never push
    pub no_push: bool,

    /// Delete each workspace once its repository is done
    pub clean: bool,

    /// Replace stale workspace contents instead of failing
    pub force: bool,

    /// Directory holding one workspace per repository
    pub work_dir: PathBuf,

    /// Appended to every repository URL (e.g. `.git`)
    pub suffix: String,
}

impl MigrationConfig {
    /// Create a config with the default flags (push, clean, no force)
    pub fn new<S, I, R>(origin_host: S, dest_host: S, repos: I, work_dir: PathBuf) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            origin_host: origin_host.into(),
            dest_host: dest_host.into(),
            repos: repos.into_iter().map(Into::into).collect(),
            no_push: false,
            clean: true,
            force: false,
            work_dir,
            suffix: String::new(),
        }
    }

    /// Set `no_push`
    pub fn no_push(mut self, no_push: bool) -> Self {
        self.no_push = no_push;
        self
    }

    /// Set `clean`
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Set `force`
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the URL suffix
    pub fn suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// URL the repository is mirrored from
    pub fn source_url(&self, repo_name: &str) -> String {
        format!("{}{}{}", self.origin_host, repo_name, self.suffix)
    }

    /// URL the repository is pushed to
    pub fn dest_url(&self, repo_name: &str) -> String {
        format!("{}{}{}", self.dest_host, repo_name, self.suffix)
    }

    /// Check the config before any repository is processed
    /// # Errors
    /// Error if a host is empty, the repo list is empty or a repo name is empty
    pub fn validate(&self) -> Result<(), GitMigratorError> {
        if self.origin_host.trim().is_empty() {
            return Err("Origin host can't be empty".into());
        }
        if self.dest_host.trim().is_empty() {
            return Err("Destination host can't be empty".into());
        }
        if self.repos.is_empty() {
            return Err("No repositories to migrate".into());
        }
        if let Some(idx) = self.repos.iter().position(|r| r.trim().is_empty()) {
            return Err(format!("Repository name at position {idx} is empty").into());
        }
        Ok(())
    }
}

/// Configuration data read from the config file
#[derive(Deserialize, Serialize, Default, Clone, Debug, PartialEq)]
pub struct ConfigData {
    /// Base URL of the source host
    pub origin_host: Option<String>,

    /// Base URL of the destination host
    pub dest_host: Option<String>,

    /// Repositories to migrate
    pub repos: Option<Vec<String>>,

    /// Skip the push step
    pub no_push: Option<bool>,

    /// Delete workspaces afterwards
    pub clean: Option<bool>,

    /// Replace stale workspaces
    pub force: Option<bool>,

    /// Working root for the workspaces
    pub work_dir: Option<PathBuf>,

    /// URL suffix
    pub suffix: Option<String>,

    /// Transport to use
    pub transport: Option<TransportType>,
}

/// Configuration of one invocation: config file layered under the CLI arguments
#[derive(Default, Clone, Debug)]
pub struct GitMigratorConfig {
    /// path to the configuration file
    pub config_path: PathBuf,

    /// actual configuration data
    pub config_data: ConfigData,

    /// CLI arguments
    pub cli_args: GitMigratorCli,
}

impl GitMigratorConfig {
    /// Create a new Config object from the CLI arguments
    ///
    /// The default config file is optional, an explicit `--config` path must exist.
    /// # Errors
    /// Error if the config file can't be read or parsed
    pub fn try_new(cli_args: GitMigratorCli) -> Result<Self, GitMigratorError> {
        let (config_path, required) = match cli_args.config.clone() {
            Some(p) => (p, true),
            None => (Self::get_config_path()?, false),
        };
        let config_data = if required || config_path.exists() {
            let contents = read_to_string(&config_path).map_err(|e| {
                GitMigratorError::new(GitMigratorErrorKind::Io)
                    .with_text(&format!("Unable to open {}: {e}", config_path.display()))
            })?;
            toml::from_str(&contents)?
        } else {
            ConfigData::default()
        };
        Ok(GitMigratorConfig {
            config_path,
            config_data,
            cli_args,
        })
    }

    /// Get the path to the config file
    /// # Errors
    /// Error if the home directory can't be found
    pub fn get_config_path() -> Result<PathBuf, GitMigratorError> {
        let home_dir = match home_dir() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => return Err("Unable to get your home dir! home::home_dir() isn't working".into()),
        };
        Ok(home_dir
            .join(".config")
            .join(".git-migrator")
            .join("config.toml"))
    }

    /// Transport chosen on the CLI, then in the file, else the git binary
    pub fn transport(&self) -> TransportType {
        self.cli_args
            .transport
            .or(self.config_data.transport)
            .unwrap_or_default()
    }

    /// Whether the working root is generated for this run
    pub fn has_generated_work_dir(&self) -> bool {
        self.cli_args.work_dir.is_none() && self.config_data.work_dir.is_none()
    }

    /// Merge CLI arguments over the config file into a validated [`MigrationConfig`]
    /// # Errors
    /// Error if the merged configuration is malformed
    pub fn to_migration_config(&self) -> Result<MigrationConfig, GitMigratorError> {
        let cli = &self.cli_args;
        let data = &self.config_data;
        let origin_host = cli
            .origin_host
            .clone()
            .or_else(|| data.origin_host.clone())
            .ok_or("Missing origin host (--origin-host)")?;
        let dest_host = cli
            .dest_host
            .clone()
            .or_else(|| data.dest_host.clone())
            .ok_or("Missing destination host (--dest-host)")?;
        let repos = if cli.repos.is_empty() {
            data.repos.clone().unwrap_or_default()
        } else {
            cli.repos.clone()
        };
        let work_dir = cli
            .work_dir
            .clone()
            .or_else(|| data.work_dir.clone())
            .unwrap_or_else(generated_work_dir);
        let config = MigrationConfig::new(origin_host, dest_host, repos, work_dir)
            .no_push(cli.no_push || data.no_push.unwrap_or(false))
            .clean(!cli.no_clean && data.clean.unwrap_or(true))
            .force(cli.force || data.force.unwrap_or(false))
            .suffix(
                cli.suffix
                    .clone()
                    .or_else(|| data.suffix.clone())
                    .unwrap_or_default(),
            );
        config.validate()?;
        Ok(config)
    }
}

/// Fresh working root under the system temp dir
fn generated_work_dir() -> PathBuf {
    let rand_string: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    std::env::temp_dir().join(format!("git-migrator-{rand_string}"))
}
