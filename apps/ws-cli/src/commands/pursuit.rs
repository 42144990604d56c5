// pursuit.rs — Pursuit subcommands: list, show, advance, submit, won, lost,
// checklist authoring and proposals.

use clap::Subcommand;
use ws_client::WorkstreamApi;
use ws_pipeline::{ChecklistUpdate, ListQuery, ProposalStatus, PursuitStage};

use super::{clip, parse_id, short, Context};

#[derive(Subcommand)]
pub enum PursuitCommands {
    /// List pursuits.
    List {
        /// Filter by stage (qual, pink, red, submit, won, lost).
        #[arg(long)]
        stage: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show a pursuit with its checklist, next gate and proposals.
    Show { id: String },
    /// Move a pursuit to a stage.
    Advance {
        id: String,
        /// Target stage.
        to: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Submit the pursuit, optionally refreshing the forecast.
    Submit {
        id: String,
        #[arg(long)]
        forecast: Option<f64>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Close the pursuit as won.
    Won {
        id: String,
        /// Final contract value.
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Close the pursuit as lost.
    Lost {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Add a checklist item required for a gated stage.
    AddItem {
        id: String,
        name: String,
        /// pink, red or submit.
        #[arg(long)]
        stage: String,
    },
    /// Complete a checklist item.
    Check {
        id: String,
        item: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Reopen a checklist item.
    Uncheck { id: String, item: String },
    /// Start the next proposal version.
    Propose { id: String, title: String },
    /// Move a proposal to a new status.
    ProposalStatus { proposal: String, to: String },
}

pub fn execute(cmd: &PursuitCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        PursuitCommands::List { stage, page, limit } => {
            let query = ListQuery {
                org_id: Some(ctx.config.org_id.clone()),
                status: stage.clone(),
                page: *page,
                limit: *limit,
            };
            let listing = ctx.block_on(ctx.api.list_pursuits(&query))?;
            if listing.items.is_empty() {
                println!("No pursuits.");
                return Ok(());
            }
            println!(
                "{:<10} {:<7} {:>12} {:>4} {:<11}  TITLE",
                "ID", "STAGE", "FORECAST", "WIN%", "DUE"
            );
            println!("{}", "-".repeat(80));
            for p in &listing.items {
                println!(
                    "{:<10} {:<7} {:>12.0} {:>4} {:<11}  {}",
                    short(p.pursuit_id),
                    p.stage.to_string(),
                    p.forecast_value,
                    p.win_probability,
                    p.due_date.format("%Y-%m-%d").to_string(),
                    clip(&p.title, 36),
                );
            }
            println!(
                "\nPage {} · {} of {} pursuit(s).",
                listing.page,
                listing.items.len(),
                listing.total
            );
        }

        PursuitCommands::Show { id } => {
            let id = parse_id(id)?;
            let pursuit = ctx.block_on(ctx.api.get_pursuit(id))?;
            let checklist = ctx.block_on(ctx.api.get_checklist(id))?;
            let proposals = ctx.api.with_pipeline(|p| p.store().proposals_for(id))?;

            println!("Pursuit:     {}", pursuit.pursuit_id);
            println!("Title:       {}", pursuit.title);
            println!("Stage:       {}", pursuit.stage);
            println!("Forecast:    {:.0}", pursuit.forecast_value);
            println!("Win prob.:   {}%", pursuit.win_probability);
            println!("Due:         {}", pursuit.due_date.format("%Y-%m-%d"));
            println!("Candidate:   {}", pursuit.candidate_id);
            println!(
                "Checklist:   {}{}",
                if pursuit.checklist_complete { "complete" } else { "open items" },
                if pursuit.checklist_required { " (required)" } else { "" }
            );
            if let Some(outcome) = &pursuit.outcome {
                println!("Outcome:     {}", serde_json::to_string(outcome)?);
            }

            if !checklist.is_empty() {
                println!();
                for item in &checklist {
                    println!(
                        "  [{}] {:<7} {}  {}",
                        if item.completed { "x" } else { " " },
                        item.required_for_stage.to_string(),
                        short(item.item_id),
                        item.name
                    );
                }
            }

            if let Some(next) = pursuit.stage.next() {
                if next.is_gated() {
                    let report = ctx.api.with_pipeline(|p| p.gate_report(id, next))?;
                    if report.satisfied {
                        println!("\nGate for {}: clear.", next);
                    } else {
                        println!("\nGate for {}: missing {}", next, report.missing.join(", "));
                    }
                }
            }

            if !proposals.is_empty() {
                println!("\nProposals:");
                for p in &proposals {
                    println!(
                        "  v{:<3} {:<9} {}  {}",
                        p.version,
                        p.status.to_string(),
                        short(p.proposal_id),
                        p.title
                    );
                }
            }
        }

        PursuitCommands::Advance { id, to, note } => {
            let id = parse_id(id)?;
            let to: PursuitStage = to.parse()?;
            let pursuit = ctx.block_on(ctx.commands.advance_pursuit(id, to, note.clone()))?;
            println!("Pursuit {} is now {}.", pursuit.pursuit_id, pursuit.stage);
        }

        PursuitCommands::Submit { id, forecast, note } => {
            let id = parse_id(id)?;
            let pursuit =
                ctx.block_on(ctx.commands.submit_pursuit(id, *forecast, note.clone()))?;
            println!(
                "Pursuit {} submitted (forecast {:.0}).",
                pursuit.pursuit_id, pursuit.forecast_value
            );
        }

        PursuitCommands::Won { id, value, notes } => {
            let id = parse_id(id)?;
            let pursuit = ctx.block_on(ctx.commands.mark_won(id, *value, notes.clone()))?;
            println!("Pursuit {} won.", pursuit.pursuit_id);
        }

        PursuitCommands::Lost { id, reason, notes } => {
            let id = parse_id(id)?;
            let pursuit =
                ctx.block_on(ctx.commands.mark_lost(id, reason.clone(), notes.clone()))?;
            println!("Pursuit {} lost: {}.", pursuit.pursuit_id, reason);
        }

        PursuitCommands::AddItem { id, name, stage } => {
            let id = parse_id(id)?;
            let stage: PursuitStage = stage.parse()?;
            let item = ctx
                .api
                .with_pipeline(|p| p.add_checklist_item(id, name, stage))?;
            println!("Checklist item {} added for {}.", item.item_id, stage);
        }

        PursuitCommands::Check { id, item, by } => {
            update_item(ctx, id, item, true, by.clone())?;
        }

        PursuitCommands::Uncheck { id, item } => {
            update_item(ctx, id, item, false, None)?;
        }

        PursuitCommands::Propose { id, title } => {
            let id = parse_id(id)?;
            let proposal = ctx.api.with_pipeline(|p| p.add_proposal(id, title))?;
            println!(
                "Proposal v{} ({}) created.",
                proposal.version, proposal.proposal_id
            );
        }

        PursuitCommands::ProposalStatus { proposal, to } => {
            let proposal = parse_id(proposal)?;
            let to: ProposalStatus = to.parse()?;
            let proposal = ctx
                .api
                .with_pipeline(|p| p.transition_proposal(proposal, to))?;
            println!("Proposal v{} is now {}.", proposal.version, proposal.status);
        }
    }

    Ok(())
}

fn update_item(
    ctx: &Context,
    pursuit: &str,
    item: &str,
    completed: bool,
    by: Option<String>,
) -> anyhow::Result<()> {
    let pursuit_id = parse_id(pursuit)?;
    let item_id = parse_id(item)?;
    let items = ctx.block_on(ctx.api.update_checklist(
        pursuit_id,
        vec![ChecklistUpdate {
            item_id,
            completed,
            completed_by: by,
        }],
    ))?;
    let open = items.iter().filter(|i| !i.completed).count();
    println!(
        "Checklist updated: {} of {} item(s) open.",
        open,
        items.len()
    );
    Ok(())
}
