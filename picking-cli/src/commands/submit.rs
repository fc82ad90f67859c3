//! `picking submit` — commit and push a payload file in-process.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use picking_server::http::SubmitRequest;

use super::RepoArgs;

/// Arguments for `picking submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// JSON file shaped like the POST body: `{"data": {...}, "meta": {...}}`.
    pub payload: PathBuf,

    /// Commit author; defaults to `meta.author` in the payload.
    #[arg(long)]
    pub author: Option<String>,
}

impl SubmitArgs {
    pub fn run(self, repo: &RepoArgs) -> Result<()> {
        let bytes = std::fs::read(&self.payload)
            .with_context(|| format!("failed to read {}", self.payload.display()))?;
        let request: SubmitRequest = serde_json::from_slice(&bytes)
            .with_context(|| format!("invalid payload in {}", self.payload.display()))?;
        let author = self.author.or_else(|| request.author());

        let (config, service) = repo.open_service()?;
        let commit = service
            .submit(&request.data, author.as_deref())
            .map_err(|e| anyhow::anyhow!(e.detail()))?;

        let short = commit.hash.0.get(..7).unwrap_or(&commit.hash.0);
        if commit.created {
            println!(
                "{} committed {} records as {} and pushed to {}/{}",
                "✓".green().bold(),
                request.data.len(),
                short.bold(),
                config.remote,
                config.branch,
            );
        } else {
            println!(
                "{} snapshot unchanged at {}; pushed to {}/{}",
                "·".bright_black().bold(),
                short.bold(),
                config.remote,
                config.branch,
            );
        }
        Ok(())
    }
}
