//! picking — backup server and local tooling for the picking-list snapshot.
//!
//! # Usage
//!
//! ```text
//! picking [--repo <path>] [--branch <name>] [--file <path>] serve [--host <addr>] [--port <n>]
//! picking show
//! picking submit <payload.json> [--author <name>]
//! picking status [--json]
//! picking diff
//! ```
//!
//! Settings come from the environment (and `.env`); flags override them.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, serve::ServeArgs, show::ShowArgs, status::StatusArgs, submit::SubmitArgs,
    RepoArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "picking",
    version,
    about = "Git-backed backup service for the picking-list snapshot",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    repo: RepoArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP backup server until ctrl-c.
    Serve(ServeArgs),

    /// Print the current snapshot as the fetch endpoint returns it.
    Show(ShowArgs),

    /// Submit a `{data, meta}` payload file without going through HTTP.
    Submit(SubmitArgs),

    /// Show repository health and whether the snapshot file matches HEAD.
    Status(StatusArgs),

    /// Show a unified diff of snapshot changes not yet committed.
    Diff(DiffArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(&cli.repo),
        Commands::Show(args) => args.run(&cli.repo),
        Commands::Submit(args) => args.run(&cli.repo),
        Commands::Status(args) => args.run(&cli.repo),
        Commands::Diff(args) => args.run(&cli.repo),
    }
}
