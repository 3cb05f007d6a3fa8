//! Local workspaces holding one mirror clone each
use std::{
    fs::{create_dir_all, read_dir, remove_dir_all, remove_file, symlink_metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::{
    config::MigrationConfig,
    errors::{GitMigratorError, GitMigratorErrorKind},
};

/// Hands out one workspace directory per repository under a working root
#[derive(Debug, Clone)]
pub(crate) struct WorkspaceManager {
    /// Working root
    root: PathBuf,

    /// Delete workspaces on release
    clean: bool,

    /// Replace stale workspace contents
    force: bool,
}

impl WorkspaceManager {
    /// Create a manager
    pub(crate) fn new(root: PathBuf, clean: bool, force: bool) -> Self {
        Self { root, clean, force }
    }

    /// Create a manager for the batch described by `config`
    pub(crate) fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.work_dir.clone(), config.clean, config.force)
    }

    /// Workspace path of a repository, always a direct child of the root
    pub(crate) fn path_for(&self, repo_name: &str) -> PathBuf {
        self.root.join(workspace_dir_name(repo_name))
    }

    /// Allocate the workspace of `repo_name`
    ///
    /// An occupied path is a [`GitMigratorErrorKind::PathConflict`] unless `force`
    /// is set, in which case its contents are removed first.
    pub(crate) fn acquire(&self, repo_name: &str) -> Result<Workspace, GitMigratorError> {
        let path = self.path_for(repo_name);
        match symlink_metadata(&path) {
            Ok(meta) => {
                let is_dir = meta.is_dir();
                let occupied = !is_dir || read_dir(&path)?.next().is_some();
                if occupied {
                    if !self.force {
                        return Err(GitMigratorError::new(GitMigratorErrorKind::PathConflict)
                            .with_text(&format!(
                                "'{}' already exists and is not empty (use --force to replace it)",
                                path.display()
                            )));
                    }
                    info!("Found existing '{}'. Removing it", path.display());
                    if is_dir {
                        remove_dir_all(&path)?;
                    } else {
                        remove_file(&path)?;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        create_dir_all(&path)?;
        Ok(Workspace {
            path,
            clean: self.clean,
            released: false,
        })
    }
}

/// Directory holding the mirror of exactly one in-flight repository
///
/// Released exactly once through [`Workspace::release`]; a workspace dropped
/// without release (panic) is still removed when `clean` is set.
#[derive(Debug)]
pub(crate) struct Workspace {
    /// Directory of the mirror
    path: PathBuf,

    /// Delete on release
    clean: bool,

    /// Release already happened
    released: bool,
}

impl Workspace {
    /// Directory of the mirror
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Release the workspace, returns the path if it is still on disk
    pub(crate) fn release(mut self) -> Option<PathBuf> {
        self.released = true;
        if !self.clean {
            return Some(self.path.clone());
        }
        match remove_dir_all(&self.path) {
            Ok(()) => {
                info!("Removed workspace '{}'", self.path.display());
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Unable to remove workspace '{}': {e}", self.path.display());
                Some(self.path.clone())
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released || !self.clean {
            return;
        }
        if let Err(e) = remove_dir_all(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Unable to remove workspace '{}': {e}", self.path.display());
            }
        }
    }
}

/// Sanitized, collision-resistant directory name for a repository
fn workspace_dir_name(repo_name: &str) -> String {
    let sanitized: String = repo_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let digest = Sha256::digest(repo_name.as_bytes());
    format!("{sanitized}-{}.git", &hex::encode(digest)[..8])
}
