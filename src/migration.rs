//! Migration of a single repository
use std::{fmt, path::Path, path::PathBuf, sync::Arc};

use log::{error, info};
use tokio::sync::watch;

use crate::{
    config::MigrationConfig, errors::GitMigratorError, transport::MirrorTransport,
    workspace::WorkspaceManager,
};

/// Stages of a repository migration, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    /// Nothing done yet
    Init,

    /// Workspace allocated
    WorkspaceReady,

    /// Mirror clone done
    Fetched,

    /// Push destination rewritten
    Retargeted,

    /// Mirror pushed
    Pushed,

    /// Push skipped on request
    SkippedPush,

    /// Workspace released
    Done,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            MigrationStage::Init => "init",
            MigrationStage::WorkspaceReady => "workspace ready",
            MigrationStage::Fetched => "fetched",
            MigrationStage::Retargeted => "retargeted",
            MigrationStage::Pushed => "pushed",
            MigrationStage::SkippedPush => "skipped push",
            MigrationStage::Done => "done",
        };
        write!(f, "{stage}")
    }
}

/// Last stage reached by a failed migration, with the error that stopped it
#[derive(Debug)]
pub struct FailureDetail {
    /// Last stage reached
    pub stage: MigrationStage,

    /// Error that stopped the migration
    pub error: GitMigratorError,
}

/// Final status of one repository
#[derive(Debug)]
pub enum OutcomeStatus {
    /// Cloned and pushed
    Succeeded,

    /// Cloned and retargeted, push skipped on request
    ClonedOnly,

    /// Stopped by an error
    Failed(FailureDetail),
}

/// Outcome of migrating one repository
#[derive(Debug)]
pub struct RepoOutcome {
    /// Repository name as configured
    pub repo_name: String,

    /// Final status
    pub status: OutcomeStatus,

    /// Workspace left on disk, if any
    pub workspace_path: Option<PathBuf>,
}

impl RepoOutcome {
    /// Outcome of a repository that failed at `stage`
    pub(crate) fn failed(
        repo_name: String,
        stage: MigrationStage,
        error: GitMigratorError,
        workspace_path: Option<PathBuf>,
    ) -> Self {
        Self {
            repo_name,
            status: OutcomeStatus::Failed(FailureDetail { stage, error }),
            workspace_path,
        }
    }

    /// Whether the repository failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }

    /// Failure detail, present iff the repository failed
    pub fn error_detail(&self) -> Option<&FailureDetail> {
        match &self.status {
            OutcomeStatus::Failed(detail) => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for RepoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            OutcomeStatus::Succeeded => write!(f, "{}: migrated", self.repo_name)?,
            OutcomeStatus::ClonedOnly => write!(f, "{}: cloned, push skipped", self.repo_name)?,
            OutcomeStatus::Failed(detail) => write!(
                f,
                "{}: failed after {}: {}",
                self.repo_name, detail.stage, detail.error
            )?,
        }
        if let Some(path) = &self.workspace_path {
            write!(f, " (workspace kept at {})", path.display())?;
        }
        Ok(())
    }
}

/// Drives one repository from workspace allocation to release
pub(crate) struct MigrationUnit {
    /// Batch configuration
    config: Arc<MigrationConfig>,

    /// Transport doing the remote work
    transport: Arc<dyn MirrorTransport>,

    /// Repository to migrate
    repo_name: String,

    /// Last stage reached
    stage: watch::Sender<MigrationStage>,
}

impl MigrationUnit {
    /// Create a unit and a receiver tracking its progress
    pub(crate) fn new(
        config: Arc<MigrationConfig>,
        transport: Arc<dyn MirrorTransport>,
        repo_name: String,
    ) -> (Self, watch::Receiver<MigrationStage>) {
        let (stage, progress) = watch::channel(MigrationStage::Init);
        let unit = Self {
            config,
            transport,
            repo_name,
            stage,
        };
        (unit, progress)
    }

    /// Record the stage just reached
    fn advance(&self, stage: MigrationStage) {
        self.stage.send_replace(stage);
    }

    /// Tag `error` with the last stage reached
    fn fail(&self, error: GitMigratorError) -> FailureDetail {
        FailureDetail {
            stage: *self.stage.borrow(),
            error,
        }
    }

    /// Migrate the repository; every path ends in an outcome
    pub(crate) async fn run(self) -> RepoOutcome {
        let repo_name = self.repo_name.clone();
        info!("Processing repository: {repo_name}");
        let workspace = match WorkspaceManager::from_config(&self.config).acquire(&repo_name) {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("{repo_name}: unable to prepare workspace: {e}");
                return RepoOutcome::failed(repo_name, MigrationStage::Init, e, None);
            }
        };
        self.advance(MigrationStage::WorkspaceReady);

        let result = self.drive(workspace.path()).await;
        let workspace_path = workspace.release();
        let status = match result {
            Ok(MigrationStage::Pushed) => OutcomeStatus::Succeeded,
            Ok(_) => OutcomeStatus::ClonedOnly,
            Err(detail) => {
                error!("{repo_name}: failed after {}: {}", detail.stage, detail.error);
                OutcomeStatus::Failed(detail)
            }
        };
        self.advance(MigrationStage::Done);
        RepoOutcome {
            repo_name,
            status,
            workspace_path,
        }
    }

    /// Fetch, retarget and push
    ///
    /// Returns [`MigrationStage::Pushed`] or [`MigrationStage::SkippedPush`].
    async fn drive(&self, path: &Path) -> Result<MigrationStage, FailureDetail> {
        let source_url = self.config.source_url(&self.repo_name);
        let dest_url = self.config.dest_url(&self.repo_name);

        info!("{}: creating mirror clone of '{source_url}'", self.repo_name);
        self.transport
            .fetch_mirror(&source_url, path)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(MigrationStage::Fetched);

        info!("{}: setting push URL to '{dest_url}'", self.repo_name);
        self.transport
            .retarget(path, &dest_url)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(MigrationStage::Retargeted);

        if self.config.no_push {
            info!("{}: skipping push as requested", self.repo_name);
            self.advance(MigrationStage::SkippedPush);
            return Ok(MigrationStage::SkippedPush);
        }

        info!("{}: pushing mirror to '{dest_url}'", self.repo_name);
        self.transport
            .push_mirror(path, &dest_url)
            .await
            .map_err(|e| self.fail(e))?;
        self.advance(MigrationStage::Pushed);
        Ok(MigrationStage::Pushed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{errors::GitMigratorErrorKind, transport::fake::FakeTransport};

    fn config(root: &Path) -> MigrationConfig {
        MigrationConfig::new(
            "https://origin.example/u/",
            "https://dest.example/u/",
            ["repo"],
            root.to_path_buf(),
        )
    }

    async fn migrate(config: MigrationConfig, transport: &Arc<FakeTransport>) -> RepoOutcome {
        let transport: Arc<dyn MirrorTransport> = transport.clone();
        let (unit, _progress) = MigrationUnit::new(Arc::new(config), transport, "repo".into());
        unit.run().await
    }

    fn workspace_dirs(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[tokio::test]
    async fn full_migration_succeeds_and_cleans() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let outcome = migrate(config(root.path()), &transport).await;

        assert!(matches!(outcome.status, OutcomeStatus::Succeeded));
        assert!(outcome.workspace_path.is_none());
        assert_eq!(transport.calls(), (1, 1, 1));
        assert_eq!(
            transport.pushed.lock().unwrap().as_slice(),
            ["https://dest.example/u/repo".to_string()]
        );
        assert_eq!(workspace_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn no_push_stops_after_retarget() {
        let root = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::default());
        let outcome = migrate(config(root.path()).no_push(true), &transport).await;

        assert!(matches!(outcome.status, OutcomeStatus::ClonedOnly));
        assert_eq!(transport.calls(), (1, 1, 0));
    }

    #[tokio::test]
    async fn clone_failure_is_tagged_and_still_released() {
        let root = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(FakeTransport::default().fail_fetch("https://origin.example/u/repo"));
        let outcome = migrate(config(root.path()), &transport).await;

        let detail = outcome.error_detail().unwrap();
        assert_eq!(detail.stage, MigrationStage::WorkspaceReady);
        assert_eq!(detail.error.kind(), &GitMigratorErrorKind::CloneFailed);
        assert!(detail.error.diagnostic().is_some());
        assert_eq!(transport.calls(), (1, 0, 0));
        assert_eq!(workspace_dirs(root.path()), 0);
    }

    #[tokio::test]
    async fn retarget_failure_is_tagged_fetched() {
        let root = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(FakeTransport::default().fail_retarget("https://dest.example/u/repo"));
        let outcome = migrate(config(root.path()), &transport).await;

        let detail = outcome.error_detail().unwrap();
        assert_eq!(detail.stage, MigrationStage::Fetched);
        assert_eq!(detail.error.kind(), &GitMigratorErrorKind::RetargetFailed);
        assert_eq!(transport.calls(), (1, 1, 0));
    }

    #[tokio::test]
    async fn push_failure_keeps_workspace_without_clean() {
        let root = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(FakeTransport::default().fail_push("https://dest.example/u/repo"));
        let outcome = migrate(config(root.path()).clean(false), &transport).await;

        let detail = outcome.error_detail().unwrap();
        assert_eq!(detail.stage, MigrationStage::Retargeted);
        assert_eq!(detail.error.kind(), &GitMigratorErrorKind::PushFailed);
        let kept = outcome.workspace_path.as_ref().unwrap();
        assert!(kept.join("HEAD").is_file());
        assert!(outcome.to_string().contains("workspace kept at"));
    }

    #[tokio::test]
    async fn occupied_workspace_fails_before_any_transport_call() {
        let root = tempfile::tempdir().unwrap();
        let path = WorkspaceManager::new(root.path().to_path_buf(), true, false).path_for("repo");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("stale"), "untouched").unwrap();

        let transport = Arc::new(FakeTransport::default());
        let outcome = migrate(config(root.path()), &transport).await;

        let detail = outcome.error_detail().unwrap();
        assert_eq!(detail.stage, MigrationStage::Init);
        assert_eq!(detail.error.kind(), &GitMigratorErrorKind::PathConflict);
        assert_eq!(transport.calls(), (0, 0, 0));
        assert_eq!(
            std::fs::read_to_string(path.join("stale")).unwrap(),
            "untouched"
        );
    }

    #[test]
    fn outcome_lines() {
        let ok = RepoOutcome {
            repo_name: "a".into(),
            status: OutcomeStatus::Succeeded,
            workspace_path: None,
        };
        assert_eq!(ok.to_string(), "a: migrated");
        let failed = RepoOutcome::failed(
            "b".into(),
            MigrationStage::WorkspaceReady,
            GitMigratorError::new(GitMigratorErrorKind::CloneFailed).with_status(Some(128)),
            None,
        );
        assert_eq!(
            failed.to_string(),
            "b: failed after workspace ready: CloneFailed (exit status 128)"
        );
    }
}
