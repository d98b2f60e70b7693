//! `sprintlens` operator CLI.
//!
//! ## Commands
//!
//! - `sprintlens migrate`
//! - `sprintlens ingest --event push --file payload.json [--delivery ID]`
//! - `sprintlens resolve --workspace WS [--branch B] --message M`
//! - `sprintlens metrics --sprint ID`
//! - `sprintlens burndown --sprint ID`
//! - `sprintlens risks --sprint ID`
//! - `sprintlens snapshot (--sprint ID | --all-active)`
//! - `sprintlens repo register|deactivate|lookup`

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod context;
mod ingest_cmd;
mod repo_cmd;
mod report_cmd;

use context::{Context, GlobalArgs};

#[derive(Debug, Parser)]
#[command(name = "sprintlens", version = sprintlens_core::VERSION)]
#[command(about = "Sprint analytics and git activity attribution")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or upgrade the database schema.
    Migrate,
    /// Ingest a webhook payload from a file.
    Ingest(ingest_cmd::IngestArgs),
    /// Show which work item a branch/message would be attributed to.
    Resolve(ingest_cmd::ResolveArgs),
    /// Live sprint metrics.
    Metrics(report_cmd::SprintArgs),
    /// Ideal-vs-actual burndown series from stored snapshots.
    Burndown(report_cmd::SprintArgs),
    /// Current risk signals for a sprint.
    Risks(report_cmd::SprintArgs),
    /// Capture today's snapshot (run daily from cron).
    Snapshot(report_cmd::SnapshotArgs),
    /// Repository registry.
    Repo(repo_cmd::RepoCli),
}

fn init_tracing() {
    // Logs go to stderr so `--json` output stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::open(&cli.global)?;
    match cli.command {
        Command::Migrate => report_cmd::cmd_migrate(&ctx),
        Command::Ingest(args) => ingest_cmd::cmd_ingest(&ctx, &args),
        Command::Resolve(args) => ingest_cmd::cmd_resolve(&ctx, &args),
        Command::Metrics(args) => report_cmd::cmd_metrics(&ctx, &args),
        Command::Burndown(args) => report_cmd::cmd_burndown(&ctx, &args),
        Command::Risks(args) => report_cmd::cmd_risks(&ctx, &args),
        Command::Snapshot(args) => report_cmd::cmd_snapshot(&ctx, &args),
        Command::Repo(repo) => repo.run(&ctx),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
