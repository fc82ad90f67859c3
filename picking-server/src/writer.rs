//! Single-writer submit queue.
//!
//! Handlers enqueue a [`SubmitJob`] and await the oneshot reply. One task
//! drains the queue in arrival order and runs each submission on the
//! blocking pool, so git work never stalls the async workers.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use picking_core::Snapshot;
use picking_store::{BackupError, BackupService, CommitResult};

/// Submissions waiting behind the one in progress.
const QUEUE_DEPTH: usize = 64;

struct SubmitJob {
    snapshot: Snapshot,
    author: Option<String>,
    respond_to: oneshot::Sender<Result<CommitResult, BackupError>>,
}

/// Cloneable handle for enqueueing submissions.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<SubmitJob>,
}

impl WriterHandle {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(service: Arc<BackupService>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(writer_task(service, rx));
        Self { tx }
    }

    pub async fn submit(
        &self,
        snapshot: Snapshot,
        author: Option<String>,
    ) -> Result<CommitResult, BackupError> {
        let (respond_to, reply) = oneshot::channel();
        let job = SubmitJob {
            snapshot,
            author,
            respond_to,
        };
        self.tx
            .send(job)
            .await
            .map_err(|_| BackupError::Internal("writer queue closed".to_string()))?;
        reply
            .await
            .map_err(|_| BackupError::Internal("writer dropped the submission".to_string()))?
    }
}

async fn writer_task(service: Arc<BackupService>, mut rx: mpsc::Receiver<SubmitJob>) {
    while let Some(job) = rx.recv().await {
        let started = Instant::now();
        let records = job.snapshot.len();
        let service = service.clone();
        let SubmitJob {
            snapshot,
            author,
            respond_to,
        } = job;

        let result = tokio::task::spawn_blocking(move || service.submit(&snapshot, author.as_deref()))
            .await
            .unwrap_or_else(|err| Err(BackupError::Internal(format!("submit task join error: {err}"))));

        match &result {
            Ok(commit) => tracing::debug!(
                records,
                commit = %commit.hash,
                created = commit.created,
                duration_ms = started.elapsed().as_millis() as u64,
                "submit finished",
            ),
            Err(err) => tracing::warn!(records, error = %err.detail(), "submit failed"),
        }

        let _ = respond_to.send(result);
    }
    tracing::debug!("writer queue closed");
}
