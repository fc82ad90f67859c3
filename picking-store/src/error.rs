//! Error types for picking-store.

use std::path::PathBuf;

use thiserror::Error;

use picking_core::CodecError;

/// Errors from the snapshot file on local disk.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file exists but could not be parsed.
    #[error("failed to read snapshot at {path}: {source}")]
    BackupRead {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The snapshot could not be serialized.
    #[error("snapshot encoding failed: {0}")]
    Encode(#[source] CodecError),
}

/// Errors from the version-control collaborator.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The configured path is missing or is not a git repository.
    #[error("repository not found at {path}: {source}")]
    RepositoryNotFound {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// The repository has no work tree to stage from.
    #[error("repository at {path} is bare")]
    BareRepository { path: PathBuf },

    /// The staged path does not live inside the work tree.
    #[error("{path} is outside the work tree {workdir}")]
    OutsideWorkdir { path: PathBuf, workdir: PathBuf },

    /// Staging or committing failed.
    #[error("commit failed: {0}")]
    Commit(#[source] git2::Error),

    /// Reading HEAD or a committed blob failed.
    #[error("git read failed: {0}")]
    Read(#[source] git2::Error),

    /// Network, authentication, rejection or timeout while publishing.
    #[error("push failed: {message}")]
    PushFailed { message: String },
}

impl VcsError {
    pub(crate) fn push_failed(message: impl Into<String>) -> Self {
        VcsError::PushFailed {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the backup service. Each maps to a stable wire tag.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{0}")]
    RepositoryNotFound(#[source] VcsError),

    #[error("{0}")]
    BackupRead(#[source] StoreError),

    #[error("failed to write snapshot: {0}")]
    Write(#[source] StoreError),

    /// Any failure in the commit or push step.
    #[error("{0}")]
    PushFailed(#[source] VcsError),

    #[error("{0}")]
    Internal(String),
}

impl BackupError {
    /// Stable machine-readable tag for responses.
    pub fn tag(&self) -> &'static str {
        match self {
            BackupError::RepositoryNotFound(_) => "repository_not_found",
            BackupError::BackupRead(_) => "backup_read_error",
            BackupError::Write(_) => "backup_write_error",
            BackupError::PushFailed(_) => "git_push_failed",
            BackupError::Internal(_) => "internal_error",
        }
    }

    /// `"<tag>: <message>"`, the detail string sent to clients.
    pub fn detail(&self) -> String {
        format!("{}: {}", self.tag(), self)
    }

    /// Classify a version-control failure on the read path.
    pub(crate) fn from_vcs_read(err: VcsError) -> Self {
        match err {
            err @ VcsError::RepositoryNotFound { .. } => BackupError::RepositoryNotFound(err),
            other => BackupError::Internal(other.to_string()),
        }
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
