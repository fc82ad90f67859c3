//! Backup service — fetch and submit with commit-if-changed semantics.
//!
//! ## `submit` state machine
//!
//! ```text
//! Idle → Writing(disk) → Staging → {Unchanged | Created} → Pushed
//!                                                        ↘ PushFailed
//! ```
//!
//! The disk write is never rolled back. After a failed push the new file and
//! the local commit stay in place; the next submit pushes again.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use picking_core::{CommitId, Snapshot};

use crate::diff::{unified_diff, SnapshotDrift};
use crate::error::BackupError;
use crate::snapshot::{SnapshotRepository, WriteResult};
use crate::vcs::VersionControl;

/// Author recorded when the client does not name one.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// `meta.source` reported by [`BackupService::fetch`].
pub const FETCH_SOURCE: &str = "git";

/// Branch and push policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub branch: String,
    pub push_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            push_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchMeta {
    pub source: &'static str,
    pub commit_hash: Option<CommitId>,
    pub updated_at: DateTime<Utc>,
}

/// Current snapshot plus where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedBackup {
    pub data: Snapshot,
    pub meta: FetchMeta,
}

/// Result of a successful submit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub hash: CommitId,
    pub timestamp: DateTime<Utc>,
    /// `false` when the snapshot matched HEAD and no commit was made.
    #[serde(skip)]
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub path: PathBuf,
    pub branch: String,
    pub backup_exists: bool,
}

/// Orchestrates the snapshot file and version control.
///
/// Submissions are serialised by an internal writer lock, so two concurrent
/// submits always produce a linear history. Fetches never take the lock.
pub struct BackupService {
    snapshots: SnapshotRepository,
    vcs: Box<dyn VersionControl>,
    settings: ServiceSettings,
    writer: Mutex<()>,
}

impl BackupService {
    pub fn new(
        snapshots: SnapshotRepository,
        vcs: Box<dyn VersionControl>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            snapshots,
            vcs,
            settings,
            writer: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn snapshot_path(&self) -> &Path {
        self.snapshots.path()
    }

    /// Read the current snapshot as it is on disk, with HEAD's identifier.
    pub fn fetch(&self) -> Result<FetchedBackup, BackupError> {
        let commit_hash = self
            .vcs
            .head_identifier()
            .map_err(BackupError::from_vcs_read)?;
        let data = self.snapshots.read().map_err(BackupError::BackupRead)?;
        Ok(FetchedBackup {
            data,
            meta: FetchMeta {
                source: FETCH_SOURCE,
                commit_hash,
                updated_at: Utc::now(),
            },
        })
    }

    /// Replace the snapshot, commit it if it changed, then push.
    pub fn submit(
        &self,
        snapshot: &Snapshot,
        author: Option<&str>,
    ) -> Result<CommitResult, BackupError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR);

        let write = self.snapshots.write(snapshot).map_err(BackupError::Write)?;

        let message = commit_message(author, Local::now());
        let outcome = self
            .vcs
            .stage_and_commit_if_changed(self.snapshots.path(), &message)
            .map_err(|err| {
                tracing::error!(error = %err, "commit failed; snapshot file left as written");
                BackupError::PushFailed(err)
            })?;

        if let Err(err) = self
            .vcs
            .push(&self.settings.branch, self.settings.push_timeout)
        {
            tracing::error!(
                error = %err,
                commit = %outcome.id(),
                branch = %self.settings.branch,
                "push failed; local commit retained for retry",
            );
            return Err(BackupError::PushFailed(err));
        }

        tracing::info!(
            author,
            records = snapshot.len(),
            written = matches!(write, WriteResult::Written { .. }),
            created = outcome.is_created(),
            commit = %outcome.id(),
            "backup submitted",
        );

        Ok(CommitResult {
            hash: outcome.id().clone(),
            timestamp: Utc::now(),
            created: outcome.is_created(),
        })
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            path: self.vcs.workdir().components().collect(),
            branch: self.settings.branch.clone(),
            backup_exists: self.snapshots.exists(),
        }
    }

    /// Compare the file on disk with what HEAD committed.
    pub fn drift(&self) -> Result<SnapshotDrift, BackupError> {
        let head = self
            .vcs
            .head_identifier()
            .map_err(BackupError::from_vcs_read)?;
        let on_disk = self
            .snapshots
            .read_bytes()
            .map_err(BackupError::BackupRead)?;
        let committed = self
            .vcs
            .committed_contents(self.snapshots.path())
            .map_err(BackupError::from_vcs_read)?;
        Ok(SnapshotDrift::classify(
            on_disk.as_deref(),
            committed.as_deref(),
            head,
        ))
    }

    /// Unified diff of uncommitted snapshot changes, `None` when in sync.
    pub fn diff(&self) -> Result<Option<String>, BackupError> {
        let on_disk = self
            .snapshots
            .read_bytes()
            .map_err(BackupError::BackupRead)?
            .unwrap_or_default();
        let committed = self
            .vcs
            .committed_contents(self.snapshots.path())
            .map_err(BackupError::from_vcs_read)?
            .unwrap_or_default();
        Ok(unified_diff(
            &self.display_path(),
            &String::from_utf8_lossy(&committed),
            &String::from_utf8_lossy(&on_disk),
        ))
    }

    fn display_path(&self) -> String {
        let path = self.snapshots.path();
        path.strip_prefix(self.vcs.workdir())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// `[picking-todo] update backup by <author> at <YYYY-MM-DD HH:MM:SS>`
pub fn commit_message(author: &str, at: DateTime<Local>) -> String {
    format!(
        "[picking-todo] update backup by {author} at {}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use picking_core::{Record, Status};
    use tempfile::TempDir;

    use super::*;
    use crate::error::VcsError;
    use crate::vcs::CommitOutcome;

    /// In-memory stand-in that records calls.
    #[derive(Default)]
    struct RecordingVcs {
        workdir: PathBuf,
        messages: Mutex<Vec<String>>,
        pushes: Mutex<usize>,
        fail_push: bool,
    }

    impl VersionControl for Arc<RecordingVcs> {
        fn workdir(&self) -> &Path {
            &self.workdir
        }

        fn head_identifier(&self) -> Result<Option<CommitId>, VcsError> {
            let n = self.messages.lock().unwrap().len();
            Ok((n > 0).then(|| CommitId(format!("c{n}"))))
        }

        fn stage_and_commit_if_changed(
            &self,
            _path: &Path,
            message: &str,
        ) -> Result<CommitOutcome, VcsError> {
            let mut messages = self.messages.lock().unwrap();
            messages.push(message.to_string());
            Ok(CommitOutcome::Created(CommitId(format!("c{}", messages.len()))))
        }

        fn push(&self, _branch: &str, _timeout: Duration) -> Result<(), VcsError> {
            *self.pushes.lock().unwrap() += 1;
            if self.fail_push {
                return Err(VcsError::push_failed("connection refused"));
            }
            Ok(())
        }

        fn committed_contents(&self, _path: &Path) -> Result<Option<Vec<u8>>, VcsError> {
            Ok(None)
        }
    }

    fn service(tmp: &TempDir, vcs: Arc<RecordingVcs>) -> BackupService {
        BackupService::new(
            SnapshotRepository::new(tmp.path().join("backup.json")),
            Box::new(vcs),
            ServiceSettings::default(),
        )
    }

    fn shipped() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("ORD-1", Record::with_status(Status::Shipped));
        snapshot
    }

    #[test]
    fn commit_message_format() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap();
        assert_eq!(
            commit_message("sato", at),
            "[picking-todo] update backup by sato at 2024-05-01 09:05:07"
        );
    }

    #[test]
    fn blank_author_is_unknown() {
        let tmp = TempDir::new().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let svc = service(&tmp, vcs.clone());

        svc.submit(&shipped(), Some("   ")).unwrap();
        svc.submit(&shipped(), None).unwrap();

        let messages = vcs.messages.lock().unwrap();
        assert!(messages
            .iter()
            .all(|m| m.starts_with("[picking-todo] update backup by unknown at ")));
    }

    #[test]
    fn push_failure_is_reported_after_write() {
        let tmp = TempDir::new().unwrap();
        let vcs = Arc::new(RecordingVcs {
            fail_push: true,
            ..RecordingVcs::default()
        });
        let svc = service(&tmp, vcs.clone());

        let err = svc.submit(&shipped(), Some("sato")).unwrap_err();
        assert_eq!(err.tag(), "git_push_failed");
        assert!(err.detail().contains("connection refused"));
        assert_eq!(svc.fetch().unwrap().data, shipped());
        assert_eq!(*vcs.pushes.lock().unwrap(), 1);
    }

    #[test]
    fn fetch_on_empty_repository() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp, Arc::new(RecordingVcs::default()));
        let fetched = svc.fetch().unwrap();
        assert!(fetched.data.is_empty());
        assert_eq!(fetched.meta.commit_hash, None);
        assert_eq!(fetched.meta.source, "git");
    }

    #[test]
    fn health_reports_file_presence() {
        let tmp = TempDir::new().unwrap();
        let vcs = Arc::new(RecordingVcs {
            workdir: tmp.path().to_path_buf(),
            ..RecordingVcs::default()
        });
        let svc = service(&tmp, vcs);
        assert!(!svc.health().backup_exists);
        svc.submit(&shipped(), None).unwrap();
        let health = svc.health();
        assert!(health.backup_exists);
        assert_eq!(health.branch, "main");
        assert_eq!(health.path, tmp.path());
    }
}
