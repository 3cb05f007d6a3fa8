//! Mirror transports: the remote operations a migration is built from
use std::{future::Future, path::Path, pin::Pin, sync::Arc};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::GitMigratorError;

pub(crate) mod command;
pub(crate) mod libgit;

pub use command::GitCommand;
pub use libgit::LibGit;

/// Name of the remote created by a mirror clone
pub(crate) const ORIGIN: &str = "origin";

/// Refspec mapping every ref onto itself
pub(crate) const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

/// Future returned by the transport operations
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), GitMigratorError>> + Send + 'a>>;

/// Primitive mirror operations
///
/// Running two operations against the same path at the same time is not supported.
pub trait MirrorTransport: Sync + Send {
    /// Pull every branch, tag and ref of `source_url` into a fresh mirror at `dest_path`
    fn fetch_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest_path: &'a Path,
    ) -> TransportFuture<'a>;

    /// Rewrite the push destination of the mirror at `dest_path`, without fetching
    fn retarget<'a>(&'a self, dest_path: &'a Path, new_remote_url: &'a str) -> TransportFuture<'a>;

    /// Make `target_url` an exact replica of the mirror at `dest_path`
    fn push_mirror<'a>(&'a self, dest_path: &'a Path, target_url: &'a str) -> TransportFuture<'a>;

    /// Check that the transport can run at all
    fn check_available(&self) -> TransportFuture<'_>;

    /// Display name
    fn name(&self) -> &str;
}

/// Available transports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// The `git` program
    #[default]
    Git,

    /// libgit2, in process
    Libgit2,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Git => write!(f, "git"),
            TransportType::Libgit2 => write!(f, "libgit2"),
        }
    }
}

/// Build the transport of the given type
pub fn get_transport(transport_type: TransportType) -> Arc<dyn MirrorTransport> {
    match transport_type {
        TransportType::Git => Arc::new(GitCommand::default()),
        TransportType::Libgit2 => Arc::new(LibGit::new()),
    }
}


/// Local repositories for transport tests
#[cfg(test)]
pub(crate) mod testing {
    use std::{collections::BTreeMap, path::Path};

    use git2::{Oid, Repository, Signature};

    /// Bare repository with `main`, `feature` and a `v1` tag, HEAD on `main`
    pub(crate) fn seed_repo(path: &Path) -> Repository {
        let repo = Repository::init_bare(path).unwrap();
        {
            let sig = Signature::now("Test", "test@example.com").unwrap();
            let tree_id = repo.treebuilder(None).unwrap().write().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let first = repo
                .commit(Some("refs/heads/main"), &sig, &sig, "init", &tree, &[])
                .unwrap();
            let parent = repo.find_commit(first).unwrap();
            let second = repo
                .commit(
                    Some("refs/heads/feature"),
                    &sig,
                    &sig,
                    "feature",
                    &tree,
                    &[&parent],
                )
                .unwrap();
            repo.reference("refs/tags/v1", second, false, "tag v1")
                .unwrap();
            repo.set_head("refs/heads/main").unwrap();
        }
        repo
    }

    /// Empty bare repository to push into
    pub(crate) fn empty_repo(path: &Path) -> Repository {
        Repository::init_bare(path).unwrap()
    }

    /// Every direct ref of the repository at `path`
    pub(crate) fn ref_names(path: &Path) -> BTreeMap<String, Oid> {
        let repo = Repository::open_bare(path).unwrap();
        let mut refs = BTreeMap::new();
        for reference in repo.references().unwrap() {
            let reference = reference.unwrap();
            if let (Some(name), Some(oid)) = (reference.name(), reference.target()) {
                refs.insert(name.to_string(), oid);
            }
        }
        refs
    }

    /// Configured push URL of `origin`
    pub(crate) fn push_url(path: &Path) -> Option<String> {
        let repo = Repository::open_bare(path).unwrap();
        let remote = repo.find_remote(super::ORIGIN).unwrap();
        remote.pushurl().map(str::to_string)
    }

    /// Path as a URL libgit2 and git both accept
    pub(crate) fn url(path: &Path) -> String {
        path.display().to_string()
    }
}
