//! Transport running the `git` program
use std::{ffi::OsStr, path::Path, process::Stdio};

use log::debug;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::{MirrorTransport, TransportFuture, ORIGIN};
use crate::errors::{GitMigratorError, GitMigratorErrorKind};

/// Transport shelling out to `git`, credentials come from the git credential layer
#[derive(Debug, Clone)]
pub struct GitCommand {
    /// Program to run
    program: String,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCommand {
    /// Create a transport running `program` as git
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, non-zero exit becomes an error of `kind`
    async fn run_git(
        &self,
        kind: GitMigratorErrorKind,
        args: &[&OsStr],
        cwd: Option<&Path>,
    ) -> Result<String, GitMigratorError> {
        let printable = args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Executing: {} {printable}", self.program);
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        let output = command.output().await.map_err(|e| {
            GitMigratorError::new(kind).with_text(&format!(
                "Unable to run '{}': {e}. Is git installed and in your PATH?",
                self.program
            ))
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(GitMigratorError::new(kind)
                .with_status(output.status.code())
                .with_text(&format!("'{} {printable}' failed", self.program))
                .with_diagnostic(format!("{stdout}{stderr}")));
        }
        if !stdout.trim().is_empty() {
            debug!("{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            debug!("{}", stderr.trim_end());
        }
        Ok(stdout)
    }
}

/// Arguments of `git clone --mirror`, the URL can never be read as an option
fn clone_args<'a>(source_url: &'a str, dest_path: &'a Path) -> [&'a OsStr; 5] {
    [
        OsStr::new("clone"),
        OsStr::new("--mirror"),
        OsStr::new("--"),
        OsStr::new(source_url),
        dest_path.as_os_str(),
    ]
}

impl MirrorTransport for GitCommand {
    fn fetch_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest_path: &'a Path,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            self.run_git(
                GitMigratorErrorKind::CloneFailed,
                &clone_args(source_url, dest_path),
                None,
            )
            .await?;
            Ok(())
        })
    }

    fn retarget<'a>(&'a self, dest_path: &'a Path, new_remote_url: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            self.run_git(
                GitMigratorErrorKind::RetargetFailed,
                &[
                    OsStr::new("remote"),
                    OsStr::new("set-url"),
                    OsStr::new("--push"),
                    OsStr::new(ORIGIN),
                    OsStr::new(new_remote_url),
                ],
                Some(dest_path),
            )
            .await?;
            Ok(())
        })
    }

    fn push_mirror<'a>(&'a self, dest_path: &'a Path, target_url: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            self.run_git(
                GitMigratorErrorKind::PushFailed,
                &[
                    OsStr::new("push"),
                    OsStr::new("--mirror"),
                    OsStr::new(target_url),
                ],
                Some(dest_path),
            )
            .await?;
            Ok(())
        })
    }

    fn check_available(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            let version = timeout(
                Duration::from_secs(5),
                self.run_git(GitMigratorErrorKind::Io, &[OsStr::new("--version")], None),
            )
            .await
            .map_err(|_| {
                GitMigratorError::new(GitMigratorErrorKind::Io)
                    .with_text(&format!("'{} --version' timed out", self.program))
            })??;
            debug!("Found {}", version.trim());
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "git"
    }
}
