//! Batch orchestration over the configured repositories
use std::{fmt, sync::Arc};

use log::{error, info};

use crate::{
    config::MigrationConfig,
    errors::{GitMigratorError, GitMigratorErrorKind},
    migration::{MigrationUnit, OutcomeStatus, RepoOutcome},
    transport::MirrorTransport,
    workspace::WorkspaceManager,
};

/// Runs one migration unit per repository, in input order
#[derive(Clone)]
pub struct Migrator {
    /// Transport shared by every unit
    transport: Arc<dyn MirrorTransport>,
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl Migrator {
    /// Create a migrator using `transport`
    pub fn new(transport: Arc<dyn MirrorTransport>) -> Self {
        Self { transport }
    }

    /// Migrate every repository of `config`
    ///
    /// A failing repository never stops the batch, the report holds one
    /// outcome per configured repository, in order.
    /// # Errors
    /// Error if the configuration is malformed, before any repository is touched
    pub async fn run(&self, config: MigrationConfig) -> Result<BatchReport, GitMigratorError> {
        config.validate()?;
        let config = Arc::new(config);
        let total = config.repos.len();
        let mut outcomes = Vec::with_capacity(total);
        for (idx, repo_name) in config.repos.iter().enumerate() {
            info!("[{}/{}] {repo_name}", idx + 1, total);
            let (unit, progress) =
                MigrationUnit::new(config.clone(), self.transport.clone(), repo_name.clone());
            let outcome = match tokio::spawn(unit.run()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let stage = *progress.borrow();
                    error!("{repo_name}: migration aborted after {stage}: {e}");
                    let path = WorkspaceManager::from_config(&config).path_for(repo_name);
                    let workspace_path = (!config.clean && path.exists()).then_some(path);
                    RepoOutcome::failed(
                        repo_name.clone(),
                        stage,
                        GitMigratorError::new(GitMigratorErrorKind::Panicked)
                            .with_text(&e.to_string()),
                        workspace_path,
                    )
                }
            };
            outcomes.push(outcome);
        }
        Ok(BatchReport { outcomes })
    }
}

/// Outcomes of a batch, one per configured repository, in input order
#[derive(Debug)]
pub struct BatchReport {
    /// Outcomes
    outcomes: Vec<RepoOutcome>,
}

/// Counts per status
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Cloned and pushed
    pub succeeded: usize,

    /// Cloned, push skipped
    pub cloned_only: usize,

    /// Failed
    pub failed: usize,
}

impl BatchReport {
    /// Outcomes, in input order
    pub fn outcomes(&self) -> &[RepoOutcome] {
        &self.outcomes
    }

    /// Number of outcomes
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the report is empty
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Failed outcomes
    pub fn failures(&self) -> impl Iterator<Item = &RepoOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failed())
    }

    /// Whether every repository succeeded or was cloned by design
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Process exit code: 0 iff nothing failed
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Counts per status
    pub fn summary(&self) -> BatchSummary {
        self.outcomes
            .iter()
            .fold(BatchSummary::default(), |mut summary, outcome| {
                match outcome.status {
                    OutcomeStatus::Succeeded => summary.succeeded += 1,
                    OutcomeStatus::ClonedOnly => summary.cloned_only += 1,
                    OutcomeStatus::Failed(_) => summary.failed += 1,
                }
                summary
            })
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} migrated, {} cloned only, {} failed",
            self.succeeded, self.cloned_only, self.failed
        )
    }
}
