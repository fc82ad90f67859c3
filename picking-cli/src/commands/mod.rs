pub mod diff;
pub mod serve;
pub mod show;
pub mod status;
pub mod submit;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use picking_server::Config;
use picking_store::BackupService;

/// Repository selection shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct RepoArgs {
    /// Git work tree holding the snapshot [env: REPO_PATH]
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Branch to push [env: REPO_BRANCH]
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Snapshot file, relative to the repository [env: BACKUP_FILE]
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,
}

impl RepoArgs {
    /// Environment config with these flags applied on top.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::from_env().context("failed to load configuration")?;
        if let Some(repo) = &self.repo {
            config.repo_path = repo.clone();
        }
        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(file) = &self.file {
            config.backup_file = file.clone();
        }
        Ok(config)
    }

    pub fn open_service(&self) -> Result<(Config, BackupService)> {
        let config = self.load_config()?;
        let service = picking_server::open_service(&config).with_context(|| {
            format!(
                "cannot open backup repository at {}",
                config.repo_path.display()
            )
        })?;
        Ok((config, service))
    }
}
