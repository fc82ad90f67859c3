//! `picking status` — repository health and snapshot drift.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use picking_store::{HealthReport, SnapshotDrift};

use super::RepoArgs;

/// Arguments for `picking status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    repo: HealthReport,
    remote: String,
    snapshot: SnapshotJson,
}

#[derive(Serialize)]
struct SnapshotJson {
    path: String,
    state: &'static str,
    head: Option<String>,
    records: usize,
}

impl StatusArgs {
    pub fn run(self, repo: &RepoArgs) -> Result<()> {
        let (config, service) = repo.open_service()?;
        let health = service.health();
        let drift = service.drift().map_err(|e| anyhow::anyhow!(e.detail()))?;
        let records = service
            .fetch()
            .map_err(|e| anyhow::anyhow!(e.detail()))?
            .data
            .len();

        let snapshot = SnapshotJson {
            path: service.snapshot_path().display().to_string(),
            state: drift.label(),
            head: drift.head().map(|h| h.0.clone()),
            records,
        };

        if self.json {
            let payload = StatusJson {
                repo: health,
                remote: config.remote,
                snapshot,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        println!(
            "picking v{} | {} | {}/{}",
            env!("CARGO_PKG_VERSION"),
            health.path.display(),
            config.remote,
            health.branch,
        );
        let head = snapshot
            .head
            .as_deref()
            .map(|h| h.get(..7).unwrap_or(h).to_string())
            .unwrap_or_else(|| "no commits".to_string());
        println!(
            "{} {}  {} ({} records) @ {}",
            drift_indicator(&drift),
            drift_label(&drift),
            snapshot.path,
            snapshot.records,
            head,
        );
        if matches!(drift, SnapshotDrift::Uncommitted { .. }) {
            println!("Run 'picking diff' to see what the next submit will commit.");
        }
        Ok(())
    }
}

fn drift_label(drift: &SnapshotDrift) -> &'static str {
    match drift {
        SnapshotDrift::InSync { .. } => "IN SYNC",
        SnapshotDrift::Uncommitted { .. } => "UNCOMMITTED",
        SnapshotDrift::Missing { .. } => "MISSING",
    }
}

fn drift_indicator(drift: &SnapshotDrift) -> String {
    match drift {
        SnapshotDrift::InSync { .. } => "■".green().bold().to_string(),
        SnapshotDrift::Uncommitted { .. } => "■".yellow().bold().to_string(),
        SnapshotDrift::Missing { .. } => "■".bright_black().bold().to_string(),
    }
}
