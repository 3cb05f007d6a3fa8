//! # git-migrator
//!
//! Mirror git repositories from one host to another
//!
//! ## Usage
//!
//! ```txt
//! Usage: git-migrator [OPTIONS]
//!
//! Options:
//!   -o, --origin-host <ORIGIN_HOST>  Base URL of the source host [env: GIT_MIGRATOR_ORIGIN_HOST] [aliases: from]
//!   -d, --dest-host <DEST_HOST>      Base URL of the destination host [env: GIT_MIGRATOR_DEST_HOST] [aliases: to]
//!   -r, --repos <REPOS>...           Repositories to migrate
//!       --no-push                    Clone and set the new remote, but don't push
//!       --no-clean                   Keep the local mirrors after the migration
//!   -f, --force                      Replace existing local mirrors instead of failing
//!   -w, --work-dir <WORK_DIR>        Directory holding the local mirrors
//!       --suffix <SUFFIX>            Suffix appended to every repository URL (e.g. '.git')
//!   -t, --transport <TRANSPORT>      Transport used for clone and push [possible values: git, libgit2]
//!   -c, --config <CONFIG>            Custom configuration file path
//!       --show-config-path           Show the current config path
//!   -v, --verbose...                 Verbose mode (-v, -vv)
//!   -h, --help                       Print help
//!   -V, --version                    Print version
//! ```
//!
//! ## As a library
//!
//! ```no_run
//! use std::{path::PathBuf, sync::Arc};
//! use git_migrator::{GitCommand, MigrationConfig, Migrator};
//!
//! # async fn run() -> Result<(), git_migrator::GitMigratorError> {
//! let config = MigrationConfig::new(
//!     "https://github.com/example-user/",
//!     "https://new-githost.com/example-user/",
//!     ["old-repo-1", "another-repo"],
//!     PathBuf::from("/tmp/mirrors"),
//! );
//! let report = Migrator::new(Arc::new(GitCommand::default()))
//!     .run(config)
//!     .await?;
//! std::process::exit(report.exit_code());
//! # }
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![deny(
    missing_docs,
    clippy::all,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![warn(clippy::multiple_crate_versions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub(crate) mod batch;
pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod migration;
pub(crate) mod transport;
pub(crate) mod utils;
pub(crate) mod workspace;

pub use batch::{BatchReport, BatchSummary, Migrator};
pub use cli::{git_migrator_main, GitMigratorCli};
pub use config::{ConfigData, GitMigratorConfig, MigrationConfig};
pub use errors::{GitMigratorError, GitMigratorErrorKind};
pub use migration::{FailureDetail, MigrationStage, OutcomeStatus, RepoOutcome};
pub use transport::{
    get_transport, GitCommand, LibGit, MirrorTransport, TransportFuture, TransportType,
};
pub use utils::main_migrate;
