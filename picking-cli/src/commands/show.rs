//! `picking show` — print the fetch response.

use anyhow::{Context, Result};
use clap::Args;

use picking_server::http::FetchResponse;

use super::RepoArgs;

#[derive(Args, Debug)]
pub struct ShowArgs {}

impl ShowArgs {
    pub fn run(self, repo: &RepoArgs) -> Result<()> {
        let (_, service) = repo.open_service()?;
        let fetched = service.fetch().map_err(|e| anyhow::anyhow!(e.detail()))?;
        let response = FetchResponse {
            ok: true,
            data: fetched.data,
            meta: fetched.meta,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("failed to serialize snapshot")?
        );
        Ok(())
    }
}
