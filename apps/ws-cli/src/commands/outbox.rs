// outbox.rs — Outbox subcommands: status, verify, run, watch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use tokio::sync::watch;
use ws_client::{LogDripProvider, OutboxWorker};
use ws_outbox::{Outbox, OutboxError};

use super::{short, Context};

#[derive(Subcommand)]
pub enum OutboxCommands {
    /// Show pending and dead-lettered events.
    Status,
    /// Verify the outbox hash chain.
    Verify,
    /// Attempt every due event once.
    Run,
    /// Keep delivering until interrupted.
    Watch {
        /// Seconds between passes.
        #[arg(long, default_value = "30")]
        interval: u64,
    },
}

pub fn execute(cmd: &OutboxCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        OutboxCommands::Status => {
            let outbox = ctx.api.outbox();
            let outbox = outbox
                .lock()
                .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
            println!(
                "{} pending, {} processed, {} dead-lettered.",
                outbox.pending().len(),
                outbox.processed_count(),
                outbox.dead_letters().len()
            );
            for e in outbox.pending() {
                println!(
                    "  pending  {} {:<15} retries {}  next {}",
                    short(e.event_id),
                    e.event_name,
                    e.retry_count,
                    e.next_retry_at
                        .map_or("now".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                );
            }
            for d in outbox.dead_letters() {
                println!(
                    "  dead     {} {:<15} {}",
                    short(d.event.event_id),
                    d.event.event_name,
                    d.error
                );
            }
        }

        OutboxCommands::Verify => {
            let path = &ctx.paths.outbox_log;
            match Outbox::verify_chain(path) {
                Ok(n) => println!("Outbox verified: {} entr(ies), hash chain intact.", n),
                Err(OutboxError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    anyhow::bail!("Outbox integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }

        OutboxCommands::Run => {
            let worker = OutboxWorker::new(ctx.api.outbox(), Arc::new(LogDripProvider));
            let report = ctx.block_on(worker.run_once(Utc::now()))?;
            println!(
                "{} delivered, {} rescheduled, {} dead-lettered.",
                report.delivered, report.retried, report.dead
            );
        }

        OutboxCommands::Watch { interval } => {
            let worker = OutboxWorker::new(ctx.api.outbox(), Arc::new(LogDripProvider));
            let (tx, rx) = watch::channel(false);
            ctx.block_on(async move {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        let _ = tx.send(true);
                    }
                });
                worker.run(Duration::from_secs((*interval).max(1)), rx).await;
            });
        }
    }

    Ok(())
}
