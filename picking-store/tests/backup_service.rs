//! End-to-end service behaviour against real git repositories.
//!
//! Each test builds a work tree with `main` as its initial branch and, where
//! publishing matters, a bare repository registered as `origin`.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use git2::{Repository, RepositoryInitOptions, Signature};
use picking_core::{codec, Record, Snapshot, Status};
use picking_store::{
    BackupService, GitRepository, GitSettings, ServiceSettings, SnapshotDrift, SnapshotRepository,
};
use tempfile::TempDir;

struct Fixture {
    work: TempDir,
    remote: Option<TempDir>,
}

impl Fixture {
    fn with_remote() -> Self {
        let fixture = Self::local_only();
        let remote = TempDir::new().unwrap();
        Repository::init_bare(remote.path()).unwrap();
        fixture
            .repo()
            .remote("origin", remote.path().to_str().unwrap())
            .unwrap();
        Self {
            remote: Some(remote),
            ..fixture
        }
    }

    fn local_only() -> Self {
        let work = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(work.path(), &opts).unwrap();
        let mut cfg = repo.config().unwrap();
        cfg.set_str("user.name", "Picker").unwrap();
        cfg.set_str("user.email", "picker@example.com").unwrap();
        Self { work, remote: None }
    }

    fn repo(&self) -> Repository {
        Repository::open(self.work.path()).unwrap()
    }

    fn backup_path(&self) -> std::path::PathBuf {
        self.work.path().join("backup.json")
    }

    fn service(&self) -> BackupService {
        let git = GitRepository::open(self.work.path(), GitSettings::default()).unwrap();
        BackupService::new(
            SnapshotRepository::new(self.backup_path()),
            Box::new(git),
            ServiceSettings {
                branch: "main".to_string(),
                push_timeout: Duration::from_secs(30),
            },
        )
    }

    fn remote_head(&self) -> Option<String> {
        let remote = Repository::open_bare(self.remote.as_ref()?.path()).ok()?;
        remote
            .refname_to_id("refs/heads/main")
            .ok()
            .map(|id| id.to_string())
    }

    fn commit_count(&self) -> usize {
        let repo = self.repo();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }
}

fn snapshot(entries: &[(&str, Status)]) -> Snapshot {
    entries
        .iter()
        .map(|(id, status)| (id.to_string(), Record::with_status(*status)))
        .collect()
}

fn head_message(repo: &Repository) -> String {
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    head.message().unwrap_or_default().to_string()
}

#[test]
fn fetch_before_any_submit_is_empty() {
    let fixture = Fixture::with_remote();
    let fetched = fixture.service().fetch().unwrap();
    assert!(fetched.data.is_empty());
    assert_eq!(fetched.meta.commit_hash, None);
    assert_eq!(fetched.meta.source, "git");
}

#[test]
fn resubmitting_identical_data_is_idempotent() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();
    let data = snapshot(&[("ORD-1", Status::Printed), ("ORD-2", Status::Shipped)]);

    let first = svc.submit(&data, Some("sato")).unwrap();
    let second = svc.submit(&data, Some("suzuki")).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.hash, second.hash);
    assert_eq!(fixture.commit_count(), 1);
    assert_eq!(fixture.remote_head().as_deref(), Some(first.hash.0.as_str()));
}

#[test]
fn changed_data_produces_a_new_commit() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();

    let first = svc
        .submit(&snapshot(&[("ORD-1", Status::Printed)]), Some("sato"))
        .unwrap();
    let second = svc
        .submit(&snapshot(&[("ORD-1", Status::PickingDone)]), Some("sato"))
        .unwrap();

    assert_ne!(first.hash, second.hash);
    assert_eq!(fixture.commit_count(), 2);
    assert_eq!(fixture.remote_head().as_deref(), Some(second.hash.0.as_str()));
    assert!(head_message(&fixture.repo()).starts_with("[picking-todo] update backup by sato at "));

    let fetched = svc.fetch().unwrap();
    assert_eq!(fetched.meta.commit_hash, Some(second.hash));
    assert_eq!(
        fetched.data.get("ORD-1").map(|r| r.status),
        Some(Status::PickingDone)
    );
}

#[test]
fn legacy_shipment_label_is_stored_as_shipped() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();
    let payload = br#"{"ORD-9": {"status": "shipment complete", "completedAt": "2024-05-01", "fields": {"qty": 3}}}"#;

    svc.submit(&codec::decode(payload).unwrap(), None).unwrap();

    let on_disk = std::fs::read_to_string(fixture.backup_path()).unwrap();
    assert!(on_disk.contains("\"status\": \"shipped\""));
    assert!(head_message(&fixture.repo()).contains("update backup by unknown at "));

    let record = svc.fetch().unwrap().data.get("ORD-9").cloned().unwrap();
    assert_eq!(record.status, Status::Shipped);
    assert_eq!(record.completed_at.as_deref(), Some("2024-05-01"));
    assert_eq!(record.fields.get("qty"), Some(&serde_json::json!(3)));
}

#[test]
fn concurrent_submits_form_a_linear_history() {
    let fixture = Fixture::with_remote();
    let svc = Arc::new(fixture.service());

    let handles: Vec<_> = [Status::Printed, Status::Received]
        .into_iter()
        .enumerate()
        .map(|(i, status)| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                svc.submit(&snapshot(&[("ORD-1", status)]), Some(&format!("worker-{i}")))
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.iter().all(|r| r.created));
    let repo = fixture.repo();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(head.parent_count(), 1);
    let parent = head.parent(0).unwrap();
    assert_eq!(parent.parent_count(), 0);

    let mut ids = vec![head.id().to_string(), parent.id().to_string()];
    let mut returned: Vec<_> = results.iter().map(|r| r.hash.0.clone()).collect();
    ids.sort();
    returned.sort();
    assert_eq!(ids, returned);
}

#[test]
fn push_failure_keeps_file_and_local_commit() {
    let fixture = Fixture::local_only();
    let svc = fixture.service();
    let data = snapshot(&[("ORD-1", Status::AwaitingReturn)]);

    let err = svc.submit(&data, Some("sato")).unwrap_err();
    assert_eq!(err.tag(), "git_push_failed");
    assert!(err.detail().starts_with("git_push_failed: "));

    assert_eq!(svc.fetch().unwrap().data, data);
    assert_eq!(fixture.commit_count(), 1);
    assert!(matches!(svc.drift().unwrap(), SnapshotDrift::InSync { .. }));
}

#[test]
fn diverged_remote_rejects_push_and_keeps_local_commit() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();
    svc.submit(&snapshot(&[("ORD-1", Status::Printed)]), Some("sato"))
        .unwrap();

    let diverged = {
        let remote = Repository::open_bare(fixture.remote.as_ref().unwrap().path()).unwrap();
        let parent = remote
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        let blob = remote.blob(b"edited elsewhere\n").unwrap();
        let mut builder = remote.treebuilder(None).unwrap();
        builder.insert("other.txt", blob, 0o100644).unwrap();
        let tree = remote.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::now("Elsewhere", "elsewhere@example.com").unwrap();
        remote
            .commit(Some("refs/heads/main"), &sig, &sig, "diverge", &tree, &[&parent])
            .unwrap()
            .to_string()
    };

    let data = snapshot(&[("ORD-1", Status::Shipped)]);
    let err = svc.submit(&data, Some("sato")).unwrap_err();
    assert_eq!(err.tag(), "git_push_failed");

    let local_head = fixture.repo().head().unwrap().peel_to_commit().unwrap().id().to_string();
    assert_eq!(fixture.commit_count(), 2);
    assert_ne!(local_head, diverged);
    assert_eq!(fixture.remote_head().as_deref(), Some(diverged.as_str()));

    let fetched = svc.fetch().unwrap();
    assert_eq!(fetched.data, data);
    assert_eq!(fetched.meta.commit_hash.map(|id| id.0), Some(local_head));
}

#[test]
fn hand_edited_file_shows_as_uncommitted_drift() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();
    let committed = svc
        .submit(&snapshot(&[("ORD-1", Status::Printed)]), None)
        .unwrap();

    let edited = snapshot(&[("ORD-1", Status::Shipped)]);
    std::fs::write(fixture.backup_path(), codec::encode(&edited).unwrap()).unwrap();

    assert_eq!(
        svc.drift().unwrap(),
        SnapshotDrift::Uncommitted {
            head: Some(committed.hash)
        }
    );
    let diff = svc.diff().unwrap().expect("pending changes");
    assert!(diff.contains("--- a/backup.json"));
    assert!(diff.contains("-    \"status\": \"printed\","));
    assert!(diff.contains("+    \"status\": \"shipped\","));
}

#[test]
fn missing_snapshot_file_reports_missing() {
    let fixture = Fixture::with_remote();
    let svc = fixture.service();
    assert_eq!(svc.drift().unwrap(), SnapshotDrift::Missing { head: None });
    assert_eq!(svc.diff().unwrap(), None);
    assert!(!svc.health().backup_exists);
}

#[test]
fn malformed_snapshot_is_a_read_error() {
    let fixture = Fixture::with_remote();
    std::fs::write(fixture.backup_path(), "not json").unwrap();
    let err = fixture.service().fetch().unwrap_err();
    assert_eq!(err.tag(), "backup_read_error");
}

#[test]
fn health_reports_repository_root() {
    let fixture = Fixture::with_remote();
    let health = fixture.service().health();
    assert_eq!(health.branch, "main");
    assert_eq!(
        health.path.canonicalize().unwrap(),
        Path::new(fixture.work.path()).canonicalize().unwrap()
    );
}
