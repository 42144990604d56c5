// sla.rs — SLA subcommands: sweep, breaches, rules.

use chrono::Utc;
use clap::Subcommand;

use super::{short, Context};

#[derive(Subcommand)]
pub enum SlaCommands {
    /// Evaluate every record now and update the breach ledger.
    Sweep,
    /// List open breaches.
    Breaches {
        /// Include resolved breaches.
        #[arg(long)]
        all: bool,
    },
    /// Show the active SLA rules.
    Rules,
}

pub fn execute(cmd: &SlaCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        SlaCommands::Sweep => {
            let report = ctx.api.sweep_sla(Utc::now())?;
            println!(
                "SLA sweep: {} new breach(es), {} resolved.",
                report.created.len(),
                report.resolved.len()
            );
            for b in &report.created {
                println!(
                    "  {} {} {}  {:.1}h over",
                    b.entity_type,
                    short(b.entity_id),
                    b.rule_name,
                    b.hours_over
                );
            }
        }

        SlaCommands::Breaches { all } => {
            let breaches = if *all {
                let ledger = ws_sla::BreachLedger::open(&ctx.paths.breaches_file)?;
                ledger.all().to_vec()
            } else {
                ctx.api.open_breaches()?
            };
            if breaches.is_empty() {
                println!("No breaches.");
                return Ok(());
            }
            println!(
                "{:<10} {:<10} {:<10} {:<17} {:>7}  STATE",
                "ENTITY", "ID", "RULE", "EXPECTED BY", "HOURS"
            );
            println!("{}", "-".repeat(72));
            for b in &breaches {
                println!(
                    "{:<10} {:<10} {:<10} {:<17} {:>7.1}  {}",
                    b.entity_type.to_string(),
                    short(b.entity_id),
                    b.rule_name,
                    b.expected_by.format("%Y-%m-%d %H:%M").to_string(),
                    b.hours_over,
                    if b.is_open() { "open" } else { "resolved" }
                );
            }
        }

        SlaCommands::Rules => {
            let evaluator = ctx.api.evaluator();
            println!(
                "Amber window: {}h",
                evaluator.amber_window().num_minutes() as f64 / 60.0
            );
            for rule in evaluator.rules() {
                println!(
                    "  {:<10} {:<9} {:<13} {:>6}h  {}",
                    rule.rule_name,
                    rule.entity_type.to_string(),
                    rule.anchor.to_string(),
                    rule.threshold_hours,
                    rule.applies_to.join(", ")
                );
            }
        }
    }

    Ok(())
}
