//! `repo` subcommands: the repository → workspace registry.

use clap::{Parser, Subcommand};
use sprintlens_core::integrations::{deactivate_integration, normalize_repository};
use sprintlens_core::{find_owning_workspace, register_repository};

use crate::context::{Context, print_json};

#[derive(Debug, Parser)]
pub struct RepoCli {
    #[command(subcommand)]
    pub command: RepoSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum RepoSubcommand {
    /// Claim a repository for an integration.
    Register(RegisterArgs),
    /// Stop resolving an integration's repositories.
    Deactivate(DeactivateArgs),
    /// Show which workspace owns a repository.
    Lookup(LookupArgs),
}

#[derive(Debug, Parser)]
pub struct RegisterArgs {
    /// Integration id.
    #[arg(long = "integration", short = 'i')]
    pub integration: String,

    /// Workspace the integration belongs to.
    #[arg(long = "workspace", short = 'w')]
    pub workspace: String,

    /// Repository (`owner/name` or clone URL).
    #[arg(long = "repository", short = 'r')]
    pub repository: String,
}

#[derive(Debug, Parser)]
pub struct DeactivateArgs {
    /// Integration id.
    #[arg(long = "integration", short = 'i')]
    pub integration: String,
}

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// Repository (`owner/name` or clone URL).
    #[arg(long = "repository", short = 'r')]
    pub repository: String,
}

impl RepoCli {
    pub fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match &self.command {
            RepoSubcommand::Register(args) => cmd_register(ctx, args),
            RepoSubcommand::Deactivate(args) => cmd_deactivate(ctx, args),
            RepoSubcommand::Lookup(args) => cmd_lookup(ctx, args),
        }
    }
}

fn cmd_register(ctx: &Context, args: &RegisterArgs) -> anyhow::Result<()> {
    let owner = register_repository(
        &*ctx.conn()?,
        &args.integration,
        &args.workspace,
        &args.repository,
    )?;
    if ctx.json {
        return print_json(&owner);
    }
    println!(
        "{} -> integration {} (workspace {})",
        normalize_repository(&args.repository),
        owner.integration_id,
        owner.workspace_id
    );
    Ok(())
}

fn cmd_deactivate(ctx: &Context, args: &DeactivateArgs) -> anyhow::Result<()> {
    deactivate_integration(&*ctx.conn()?, &args.integration)?;
    if ctx.json {
        return print_json(&serde_json::json!({ "deactivated": args.integration }));
    }
    println!("Deactivated integration {}", args.integration);
    Ok(())
}

fn cmd_lookup(ctx: &Context, args: &LookupArgs) -> anyhow::Result<()> {
    let owner = find_owning_workspace(&*ctx.conn()?, &args.repository)?;
    if ctx.json {
        return print_json(&owner);
    }
    match owner {
        Some(o) => println!(
            "{} -> integration {} (workspace {})",
            normalize_repository(&args.repository),
            o.integration_id,
            o.workspace_id
        ),
        None => println!("{} is not claimed by an active integration", args.repository),
    }
    Ok(())
}
