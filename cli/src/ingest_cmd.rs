//! `ingest` and `resolve` subcommands.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use clap::Parser;
use sprintlens_core::{AttributionResolver, IngestionStore, WebhookEvent};

use crate::context::{Context, print_json};

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// GitHub event name (push, pull_request, pull_request_review).
    #[arg(long = "event", short = 'e')]
    pub event: String,

    /// Payload file; `-` reads stdin.
    #[arg(long = "file", short = 'f')]
    pub file: PathBuf,

    /// Delivery id, recorded on stored events.
    #[arg(long = "delivery")]
    pub delivery: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// Workspace the lookup is scoped to.
    #[arg(long = "workspace", short = 'w')]
    pub workspace: String,

    /// Branch name.
    #[arg(long = "branch", short = 'b')]
    pub branch: Option<String>,

    /// Commit message or PR text.
    #[arg(long = "message", short = 'm', default_value = "")]
    pub message: String,
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading payload from stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading payload {}", path.display()))
}

pub fn cmd_ingest(ctx: &Context, args: &IngestArgs) -> anyhow::Result<()> {
    let body = read_payload(&args.file)?;
    let Some(event) = WebhookEvent::from_github(&args.event, &body)? else {
        bail!(
            "unsupported event '{}'; expected push, pull_request or pull_request_review",
            args.event
        );
    };

    let store = IngestionStore::new(AttributionResolver::new(&ctx.config.attribution)?);
    let conn = ctx.conn()?;
    let report = store.ingest(&conn, &event, args.delivery.as_deref())?;

    if ctx.json {
        return print_json(&report);
    }
    println!(
        "Stored {} event(s) ({} attributed), {} duplicate(s), {} unattributable, {} failed",
        report.stored,
        report.attributed,
        report.duplicates,
        report.unattributable,
        report.failed.len()
    );
    for failure in &report.failed {
        println!(
            "  failed {}: {}",
            failure.external_id.as_deref().unwrap_or("<unknown>"),
            failure.reason
        );
    }
    Ok(())
}

pub fn cmd_resolve(ctx: &Context, args: &ResolveArgs) -> anyhow::Result<()> {
    let resolver = AttributionResolver::new(&ctx.config.attribution)?;
    let conn = ctx.conn()?;
    let attribution = resolver.resolve(&*conn, args.branch.as_deref(), &args.message, &args.workspace)?;

    if ctx.json {
        return print_json(&attribution);
    }
    match attribution {
        Some(a) => println!(
            "{} ({}, confidence {:.2})",
            a.work_item_id,
            a.method.as_str(),
            a.confidence
        ),
        None => println!("unattributed"),
    }
    Ok(())
}
