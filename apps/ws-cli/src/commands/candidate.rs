// candidate.rs — Candidate subcommands: create, list, show, status, icp,
// promote, drip, drip-status.

use clap::Subcommand;
use ws_client::WorkstreamApi;
use ws_pipeline::{
    CandidateStatus, ContactInfo, DripStatus, IcpBand, IcpSummary, ListQuery, NewCandidate,
    PromotionRequest, ValueBand,
};
use ws_today::candidate_score;

use super::{clip, parse_due, parse_id, short, Context};

#[derive(Subcommand)]
pub enum CandidateCommands {
    /// Create a candidate without a source signal.
    Create {
        title: String,
        /// small, medium, large, enterprise.
        #[arg(long, default_value = "medium")]
        value_band: String,
        /// Confidence 0–100.
        #[arg(long, default_value = "50")]
        confidence: u8,
        #[arg(long)]
        contact_name: Option<String>,
        #[arg(long)]
        contact_email: Option<String>,
        #[arg(long)]
        contact_phone: Option<String>,
    },
    /// List candidates.
    List {
        /// Filter by status (new, triaged, nurture, on_hold, promoted, archived).
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show one candidate and its drip schedule.
    Show { id: String },
    /// Move a candidate to a new status.
    Status {
        id: String,
        /// Target status.
        to: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record the ICP fit score (0–100) and band (high, medium, low).
    Icp { id: String, score: f64, band: String },
    /// Promote a candidate into a pursuit.
    Promote {
        id: String,
        /// Pursuit title (defaults to the candidate title).
        #[arg(long)]
        title: Option<String>,
        /// Forecast value.
        #[arg(long)]
        forecast: f64,
        /// Due date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        due: String,
        /// Win probability 0–100 (defaults to the candidate's confidence).
        #[arg(long)]
        win_probability: Option<u8>,
        /// Mark the pursuit as expecting a checklist.
        #[arg(long)]
        checklist_required: bool,
    },
    /// Put a candidate on the nurture drip sequence.
    Drip { id: String },
    /// Record the outcome of one drip step (sent, failed, skipped, pending).
    DripStatus { schedule: String, to: String },
}

pub fn execute(cmd: &CandidateCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        CandidateCommands::Create {
            title,
            value_band,
            confidence,
            contact_name,
            contact_email,
            contact_phone,
        } => {
            let value_band: ValueBand = value_band.parse()?;
            let input = NewCandidate {
                title: title.clone(),
                value_band,
                contact: ContactInfo {
                    name: contact_name.clone(),
                    email: contact_email.clone(),
                    phone: contact_phone.clone(),
                },
                confidence: *confidence,
            };
            let org = ctx.config.org_id.clone();
            let candidate = ctx.api.with_pipeline(|p| p.create_candidate(&org, input))?;
            println!("Candidate {} created.", candidate.candidate_id);
        }

        CandidateCommands::List {
            status,
            page,
            limit,
        } => {
            let query = ListQuery {
                org_id: Some(ctx.config.org_id.clone()),
                status: status.clone(),
                page: *page,
                limit: *limit,
            };
            let listing = ctx.block_on(ctx.api.list_candidates(&query))?;
            if listing.items.is_empty() {
                println!("No candidates.");
                return Ok(());
            }
            println!(
                "{:<10} {:<10} {:<11} {:>5} {:<6}  TITLE",
                "ID", "STATUS", "VALUE", "SCORE", "ICP"
            );
            println!("{}", "-".repeat(80));
            for c in &listing.items {
                println!(
                    "{:<10} {:<10} {:<11} {:>5.2} {:<6}  {}",
                    short(c.candidate_id),
                    c.status.to_string(),
                    c.value_band.to_string(),
                    candidate_score(c),
                    c.icp.as_ref().map_or("-".to_string(), |i| i.band.to_string()),
                    clip(&c.title, 40),
                );
            }
            println!(
                "\nPage {} · {} of {} candidate(s).",
                listing.page,
                listing.items.len(),
                listing.total
            );
        }

        CandidateCommands::Show { id } => {
            let id = parse_id(id)?;
            let candidate = ctx.block_on(ctx.api.get_candidate(id))?;
            let drips = ctx.api.with_pipeline(|p| p.store().drips_for(id))?;

            println!("Candidate:   {}", candidate.candidate_id);
            println!("Title:       {}", candidate.title);
            println!("Status:      {}", candidate.status);
            println!("Value band:  {}", candidate.value_band);
            println!("Confidence:  {}", candidate.confidence);
            if let Some(icp) = &candidate.icp {
                println!("ICP:         {:.0} ({})", icp.score, icp.band);
            }
            if let Some(signal) = candidate.signal_id {
                println!("Signal:      {}", signal);
            }
            if let Some(pursuit) = candidate.pursuit_id {
                println!("Pursuit:     {}", pursuit);
            }
            println!(
                "Last touch:  {}",
                candidate.last_touch_at.format("%Y-%m-%d %H:%M")
            );
            if !drips.is_empty() {
                println!("\nDrip schedule:");
                for row in &drips {
                    println!(
                        "  day {:>2}  {:<6} {:<8} {}",
                        row.day_offset,
                        row.action.to_string(),
                        row.status.to_string(),
                        row.scheduled_at.format("%Y-%m-%d"),
                    );
                }
            }
        }

        CandidateCommands::Status { id, to, note } => {
            let id = parse_id(id)?;
            let to: CandidateStatus = to.parse()?;
            let candidate =
                ctx.block_on(ctx.commands.update_candidate_status(id, to, note.clone()))?;
            println!("Candidate {} is now {}.", candidate.candidate_id, candidate.status);
        }

        CandidateCommands::Icp { id, score, band } => {
            let id = parse_id(id)?;
            let band: IcpBand = band.parse()?;
            let icp = IcpSummary {
                score: *score,
                band,
            };
            let candidate = ctx.api.with_pipeline(|p| p.set_icp(id, icp))?;
            println!(
                "Candidate {} ICP set to {:.0} ({}).",
                candidate.candidate_id, score, band
            );
        }

        CandidateCommands::Promote {
            id,
            title,
            forecast,
            due,
            win_probability,
            checklist_required,
        } => {
            let id = parse_id(id)?;
            let due_date = parse_due(due)?;
            let title = match title {
                Some(t) => t.clone(),
                None => ctx.block_on(ctx.api.get_candidate(id))?.title,
            };
            let request = PromotionRequest {
                title,
                forecast_value: *forecast,
                due_date,
                win_probability: *win_probability,
                checklist_required: *checklist_required,
            };
            let pursuit = ctx.block_on(ctx.commands.promote_candidate(id, request))?;
            println!(
                "Candidate {} promoted to pursuit {} ({}).",
                id, pursuit.pursuit_id, pursuit.stage
            );
        }

        CandidateCommands::Drip { id } => {
            let id = parse_id(id)?;
            let ack = ctx.block_on(ctx.api.trigger_drip(id))?;
            println!(
                "Drip scheduled for {}: {} step(s){}.",
                ack.candidate_id,
                ack.scheduled,
                if ack.queued { ", dispatch queued" } else { "" }
            );
        }

        CandidateCommands::DripStatus { schedule, to } => {
            let schedule = parse_id(schedule)?;
            let to: DripStatus = to.parse()?;
            let row = ctx.api.with_pipeline(|p| p.mark_drip(schedule, to))?;
            println!(
                "Drip step day {} ({}) is now {}.",
                row.day_offset, row.action, row.status
            );
        }
    }

    Ok(())
}
