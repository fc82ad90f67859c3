//! `picking diff` — show snapshot changes that HEAD does not have yet.

use anyhow::Result;
use clap::Args;

use super::RepoArgs;

#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, repo: &RepoArgs) -> Result<()> {
        let (_, service) = repo.open_service()?;
        let diff = service.diff().map_err(|e| anyhow::anyhow!(e.detail()))?;

        match diff {
            None => println!(
                "No uncommitted changes to {}.",
                service.snapshot_path().display()
            ),
            Some(diff) => {
                print!("{diff}");
                if !diff.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
