//! `picking serve` — run the HTTP backup server.

use anyhow::{Context, Result};
use clap::Args;

use super::RepoArgs;

/// Arguments for `picking serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address [env: HOST]
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port [env: PORT]
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    pub fn run(self, repo: &RepoArgs) -> Result<()> {
        let mut config = repo.load_config()?;
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        picking_server::start_blocking(config).context("backup server failed")
    }
}
