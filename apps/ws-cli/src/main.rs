//! # ws-cli
//!
//! Command-line interface for Workstream.
//!
//! - `ws signal ingest/list/triage/ignore/enrich/convert` — inbound signals
//! - `ws candidate create/list/show/status/icp/promote/drip` — candidates
//! - `ws pursuit list/show/advance/submit/won/lost` — pursuits, plus
//!   checklist items (`add-item`, `check`, `uncheck`) and proposals
//! - `ws today` — the ranked Today panel
//! - `ws stats` — headline counts and forecast
//! - `ws sla sweep/breaches/rules` — SLA evaluation and the breach ledger
//! - `ws outbox status/verify/run/watch` — drip delivery queue

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Context;

/// Workstream: signal → candidate → pursuit pipeline.
#[derive(Parser)]
#[command(name = "ws", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest and triage inbound signals.
    Signal {
        #[command(subcommand)]
        command: commands::signal::SignalCommands,
    },
    /// Manage candidates.
    Candidate {
        #[command(subcommand)]
        command: commands::candidate::CandidateCommands,
    },
    /// Move pursuits through their stages.
    Pursuit {
        #[command(subcommand)]
        command: commands::pursuit::PursuitCommands,
    },
    /// Show the ranked Today panel.
    Today(commands::today::TodayArgs),
    /// Show pipeline counts and forecast.
    Stats {
        /// Scope the ready-to-promote count to a tier (all, critical, high,
        /// medium or low).
        #[arg(long)]
        tier: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate SLAs and inspect breaches.
    Sla {
        #[command(subcommand)]
        command: commands::sla::SlaCommands,
    },
    /// Inspect and drain the delivery outbox.
    Outbox {
        #[command(subcommand)]
        command: commands::outbox::OutboxCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't mix with table output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ws_cli=info".parse()?)
                .add_directive("ws_client=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let ctx = Context::open(&project_root)?;

    match &cli.command {
        Commands::Signal { command } => commands::signal::execute(command, &ctx),
        Commands::Candidate { command } => commands::candidate::execute(command, &ctx),
        Commands::Pursuit { command } => commands::pursuit::execute(command, &ctx),
        Commands::Today(args) => commands::today::execute(args, &ctx),
        Commands::Stats { tier, json } => {
            commands::stats::execute(tier.as_deref(), *json, &ctx)
        }
        Commands::Sla { command } => commands::sla::execute(command, &ctx),
        Commands::Outbox { command } => commands::outbox::execute(command, &ctx),
    }
}
