//! Error handling for the git-migrator crate.
use std::{error::Error as StdError, fmt};

/// Error type for the git-migrator crate.
#[derive(Debug)]
pub struct GitMigratorError {
    /// Inner error.
    inner: Box<Inner>,
}

impl GitMigratorError {
    /// Create a new error.
    pub(crate) fn new(kind: GitMigratorErrorKind) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                source: None,
                status: None,
                diagnostic: None,
            }),
        }
    }

    /// Create a new error with a text source.
    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.inner.source = Some(Box::new(std::io::Error::other(text)));
        self
    }

    /// Create a new error with a source.
    pub(crate) fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.inner.source = Some(source.into());
        self
    }

    /// Attach the exit status of the external operation.
    pub(crate) fn with_status(mut self, status: Option<i32>) -> Self {
        self.inner.status = status;
        self
    }

    /// Attach the diagnostic output captured from the external operation.
    pub(crate) fn with_diagnostic<S: Into<String>>(mut self, diagnostic: S) -> Self {
        let diagnostic = diagnostic.into();
        if !diagnostic.trim().is_empty() {
            self.inner.diagnostic = Some(diagnostic);
        }
        self
    }

    /// Kind of the error
    pub fn kind(&self) -> &GitMigratorErrorKind {
        &self.inner.kind
    }

    /// Exit status of the failing external operation, if it ran to completion
    pub fn status(&self) -> Option<i32> {
        self.inner.status
    }

    /// Diagnostic text captured from the failing external operation
    pub fn diagnostic(&self) -> Option<&str> {
        self.inner.diagnostic.as_deref()
    }
}

/// Type alias for a boxed error.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Inner error type for the git-migrator crate.
#[derive(Debug)]
struct Inner {
    /// Error kind.
    kind: GitMigratorErrorKind,

    /// Source error.
    source: Option<BoxError>,

    /// Exit status of the external operation.
    status: Option<i32>,

    /// Captured stdout/stderr of the external operation.
    diagnostic: Option<String>,
}

/// Kind of [`GitMigratorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitMigratorErrorKind {
    /// Malformed configuration, rejected before any repository is processed.
    Config,

    /// The workspace path is occupied and `force` is not set.
    PathConflict,

    /// The mirror clone failed.
    CloneFailed,

    /// Rewriting the push destination of the mirror failed.
    RetargetFailed,

    /// The mirror push failed.
    PushFailed,

    /// Local filesystem error.
    Io,

    /// Error related to Git2.
    Git2,

    /// Error related to the toml config file.
    Toml,

    /// A migration unit panicked.
    Panicked,
}

impl fmt::Display for GitMigratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.inner.kind)?;
        if let Some(status) = self.inner.status {
            write!(f, " (exit status {status})")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for GitMigratorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<std::io::Error> for GitMigratorError {
    fn from(e: std::io::Error) -> Self {
        Self::new(GitMigratorErrorKind::Io).with_source(e)
    }
}

impl From<git2::Error> for GitMigratorError {
    fn from(e: git2::Error) -> Self {
        Self::new(GitMigratorErrorKind::Git2).with_source(e)
    }
}

impl From<toml::de::Error> for GitMigratorError {
    fn from(e: toml::de::Error) -> Self {
        Self::new(GitMigratorErrorKind::Toml).with_source(e)
    }
}

impl From<&str> for GitMigratorError {
    fn from(text: &str) -> Self {
        Self::new(GitMigratorErrorKind::Config).with_text(text)
    }
}

impl From<String> for GitMigratorError {
    fn from(text: String) -> Self {
        Self::new(GitMigratorErrorKind::Config).with_text(&text)
    }
}
