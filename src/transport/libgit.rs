//! Transport running libgit2 in process
use std::path::{Path, PathBuf};

use git2::{
    AutotagOption, Cred, CredentialType, Direction, FetchOptions, PushOptions, ReferenceType,
    RemoteCallbacks, Repository,
};
use log::{debug, info};
use tokio::task::spawn_blocking;

use super::{MirrorTransport, TransportFuture, MIRROR_REFSPEC, ORIGIN};
use crate::errors::{GitMigratorError, GitMigratorErrorKind};

/// Credential attempts before giving up on a URL
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Transport backed by `git2`
#[derive(Debug, Clone, Default)]
pub struct LibGit {}

impl LibGit {
    /// Create a new libgit2 transport
    pub fn new() -> Self {
        Self {}
    }
}

/// Run blocking git2 work off the async runtime, every failure is tagged with `kind`
async fn run_blocking<F>(kind: GitMigratorErrorKind, work: F) -> Result<(), GitMigratorError>
where
    F: FnOnce() -> Result<(), git2::Error> + Send + 'static,
{
    match spawn_blocking(work).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(GitMigratorError::new(kind)
            .with_diagnostic(e.message().to_string())
            .with_source(e)),
        Err(e) => Err(GitMigratorError::new(kind).with_text(&format!("git2 task failed: {e}"))),
    }
}

/// Callbacks answering credential requests from the ambient credential layer
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str(&format!(
                "authentication failed for '{url}'"
            )));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            let username = username_from_url.unwrap_or("git");
            return Cred::ssh_key_from_agent(username);
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            return Cred::credential_helper(&config, url, username_from_url);
        }
        Cred::default()
    });
    callbacks
}

/// Mirror clone of `source_url` into a new bare repository at `dest_path`
fn fetch_mirror_blocking(source_url: &str, dest_path: &Path) -> Result<(), git2::Error> {
    let repo = Repository::init_bare(dest_path)?;
    let mut remote = repo.remote_with_fetch(ORIGIN, source_url, MIRROR_REFSPEC)?;
    repo.config()?
        .set_bool(&format!("remote.{ORIGIN}.mirror"), true)?;

    let connection = remote.connect_auth(Direction::Fetch, Some(remote_callbacks()), None)?;
    let default_branch = connection
        .default_branch()
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string));
    drop(connection);

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(remote_callbacks());
    fetch_opts.download_tags(AutotagOption::All);
    remote.fetch(&[MIRROR_REFSPEC], Some(&mut fetch_opts), None)?;

    if let Some(branch) = default_branch {
        debug!("Pointing HEAD at '{branch}'");
        repo.set_head(&branch)?;
    }
    Ok(())
}

/// Set the push URL of `origin`
fn retarget_blocking(dest_path: &Path, new_remote_url: &str) -> Result<(), git2::Error> {
    let repo = Repository::open_bare(dest_path)?;
    repo.remote_set_pushurl(ORIGIN, Some(new_remote_url))
}

/// Scratch namespace the target's refs are fetched into while comparing
const TARGET_REFS_NAMESPACE: &str = "refs/git-migrator/target/";

/// Delete every ref under [`TARGET_REFS_NAMESPACE`]
fn prune_target_refs(repo: &Repository) -> Result<(), git2::Error> {
    let mut names = vec![];
    for reference in repo.references_glob(&format!("{TARGET_REFS_NAMESPACE}*"))? {
        if let Some(name) = reference?.name() {
            names.push(name.to_string());
        }
    }
    for name in names {
        repo.find_reference(&name)?.delete()?;
    }
    Ok(())
}

/// Names of the refs `target_url` holds, read by fetching them into the scratch namespace
fn target_ref_names(repo: &Repository, target_url: &str) -> Result<Vec<String>, git2::Error> {
    let mut remote = repo.remote_anonymous(target_url)?;
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(remote_callbacks());
    fetch_opts.download_tags(AutotagOption::None);
    let refspec = format!("+refs/*:{TARGET_REFS_NAMESPACE}*");
    remote.fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)?;

    let mut names = vec![];
    for reference in repo.references_glob(&format!("{TARGET_REFS_NAMESPACE}*"))? {
        if let Some(rest) = reference?
            .name()
            .and_then(|name| name.strip_prefix(TARGET_REFS_NAMESPACE))
        {
            names.push(format!("refs/{rest}"));
        }
    }
    prune_target_refs(repo)?;
    Ok(names)
}

/// Force-push every local ref and delete every ref only the target has
fn push_mirror_blocking(dest_path: &Path, target_url: &str) -> Result<(), git2::Error> {
    let repo = Repository::open_bare(dest_path)?;
    prune_target_refs(&repo)?;
    let mut local_refs = vec![];
    for reference in repo.references()? {
        let reference = reference?;
        if reference.kind() != Some(ReferenceType::Direct) {
            continue;
        }
        if let Some(name) = reference.name() {
            local_refs.push(name.to_string());
        }
    }
    let remote_refs = target_ref_names(&repo, target_url)?;

    let mut refspecs = local_refs
        .iter()
        .map(|name| format!("+{name}:{name}"))
        .collect::<Vec<_>>();
    refspecs.extend(
        remote_refs
            .iter()
            .filter(|name| !local_refs.contains(*name))
            .map(|name| format!(":{name}")),
    );
    if refspecs.is_empty() {
        info!("Nothing to push to '{target_url}'");
        return Ok(());
    }
    debug!("Pushing {} refspecs to '{target_url}'", refspecs.len());

    let mut callbacks = remote_callbacks();
    callbacks.push_update_reference(|name, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "'{name}' rejected: {message}"
        ))),
        None => Ok(()),
    });
    let mut push_opts = PushOptions::new();
    push_opts.remote_callbacks(callbacks);
    let mut remote = repo.remote_anonymous(target_url)?;
    remote.push(&refspecs, Some(&mut push_opts))
}

impl MirrorTransport for LibGit {
    fn fetch_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest_path: &'a Path,
    ) -> TransportFuture<'a> {
        let source_url = source_url.to_string();
        let dest_path: PathBuf = dest_path.to_path_buf();
        Box::pin(async move {
            debug!("Cloning '{source_url}' into '{}'", dest_path.display());
            run_blocking(GitMigratorErrorKind::CloneFailed, move || {
                fetch_mirror_blocking(&source_url, &dest_path)
            })
            .await
        })
    }

    fn retarget<'a>(&'a self, dest_path: &'a Path, new_remote_url: &'a str) -> TransportFuture<'a> {
        let new_remote_url = new_remote_url.to_string();
        let dest_path = dest_path.to_path_buf();
        Box::pin(async move {
            run_blocking(GitMigratorErrorKind::RetargetFailed, move || {
                retarget_blocking(&dest_path, &new_remote_url)
            })
            .await
        })
    }

    fn push_mirror<'a>(&'a self, dest_path: &'a Path, target_url: &'a str) -> TransportFuture<'a> {
        let target_url = target_url.to_string();
        let dest_path = dest_path.to_path_buf();
        Box::pin(async move {
            run_blocking(GitMigratorErrorKind::PushFailed, move || {
                push_mirror_blocking(&dest_path, &target_url)
            })
            .await
        })
    }

    fn check_available(&self) -> TransportFuture<'_> {
        Box::pin(async {
            let (major, minor, rev) = git2::Version::get().libgit2_version();
            debug!("Using libgit2 {major}.{minor}.{rev}");
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "libgit2"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::testing::{empty_repo, push_url, ref_names, seed_repo, url};

    #[tokio::test]
    async fn mirror_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.git");
        let dest = dir.path().join("dest.git");
        let workspace = dir.path().join("workspace.git");
        seed_repo(&source);
        empty_repo(&dest);

        let transport = LibGit::new();
        transport
            .fetch_mirror(&url(&source), &workspace)
            .await
            .unwrap();
        assert_eq!(ref_names(&workspace), ref_names(&source));

        transport.retarget(&workspace, &url(&dest)).await.unwrap();
        assert_eq!(push_url(&workspace), Some(url(&dest)));

        transport.push_mirror(&workspace, &url(&dest)).await.unwrap();
        assert_eq!(ref_names(&dest), ref_names(&source));
    }

    #[tokio::test]
    async fn push_mirrors_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.git");
        let dest = dir.path().join("dest.git");
        let source_repo = seed_repo(&source);
        empty_repo(&dest);
        let transport = LibGit::new();

        let first = dir.path().join("first.git");
        transport.fetch_mirror(&url(&source), &first).await.unwrap();
        transport.push_mirror(&first, &url(&dest)).await.unwrap();
        assert!(ref_names(&dest).contains_key("refs/heads/feature"));

        source_repo
            .find_reference("refs/heads/feature")
            .unwrap()
            .delete()
            .unwrap();
        let second = dir.path().join("second.git");
        transport.fetch_mirror(&url(&source), &second).await.unwrap();
        transport.push_mirror(&second, &url(&dest)).await.unwrap();

        let dest_refs = ref_names(&dest);
        assert!(!dest_refs.contains_key("refs/heads/feature"));
        assert_eq!(dest_refs, ref_names(&source));
    }

    #[tokio::test]
    async fn pushing_twice_gives_the_same_replica() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.git");
        let dest = dir.path().join("dest.git");
        seed_repo(&source);
        empty_repo(&dest);
        let transport = LibGit::new();

        let workspace = dir.path().join("workspace.git");
        transport
            .fetch_mirror(&url(&source), &workspace)
            .await
            .unwrap();
        transport.push_mirror(&workspace, &url(&dest)).await.unwrap();
        let first = ref_names(&dest);
        transport.push_mirror(&workspace, &url(&dest)).await.unwrap();
        assert_eq!(ref_names(&dest), first);
    }

    #[tokio::test]
    async fn missing_source_is_a_clone_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = LibGit::new()
            .fetch_mirror(
                &url(&dir.path().join("missing.git")),
                &dir.path().join("workspace.git"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &GitMigratorErrorKind::CloneFailed);
        assert!(err.diagnostic().is_some());
    }

    #[tokio::test]
    async fn retarget_outside_a_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LibGit::new()
            .retarget(dir.path(), "https://example.invalid/repo")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &GitMigratorErrorKind::RetargetFailed);
    }
}
