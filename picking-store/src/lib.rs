//! # picking-store
//!
//! Durable, versioned storage for the picking snapshot.
//!
//! [`SnapshotRepository`] owns the file on disk, [`GitRepository`] commits and
//! publishes it, and [`BackupService`] ties the two together behind `fetch`
//! and `submit`.

pub mod diff;
pub mod error;
pub mod service;
pub mod snapshot;
pub mod vcs;

pub use diff::{unified_diff, SnapshotDrift};
pub use error::{BackupError, StoreError, VcsError};
pub use service::{
    commit_message, BackupService, CommitResult, FetchMeta, FetchedBackup, HealthReport,
    ServiceSettings,
};
pub use snapshot::{digest, SnapshotRepository, WriteResult};
pub use vcs::{CommitOutcome, GitRepository, GitSettings, VersionControl};
