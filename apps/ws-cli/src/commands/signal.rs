// signal.rs — Signal subcommands: ingest, list, triage, ignore, enrich, convert.

use clap::Subcommand;
use ws_client::WorkstreamApi;
use ws_pipeline::{
    ContactInfo, ListQuery, NewCandidate, Signal, SignalEnrichment, SignalSource, SignalStatus,
    ValueBand,
};

use super::{clip, parse_id, short, Context};

#[derive(Subcommand)]
pub enum SignalCommands {
    /// Record a new inbound signal.
    Ingest {
        /// What came in (email subject, call note, page visited).
        snippet: String,
        /// Channel: email, phone, web, referral, linkedin, other.
        #[arg(long, default_value = "email")]
        source: String,
        /// Urgency between 0.0 and 1.0.
        #[arg(long, default_value = "0.5")]
        urgency: f64,
    },
    /// List signals.
    List {
        /// Filter by status (new, triaged, candidate_created, ignored).
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Mark a signal as triaged.
    Triage { id: String },
    /// Dismiss a signal.
    Ignore { id: String },
    /// Attach enrichment results to a signal.
    Enrich {
        id: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        cluster_count: Option<u32>,
        #[arg(long)]
        urgency: Option<f64>,
    },
    /// Create the signal's candidate.
    Convert {
        id: String,
        /// Candidate title.
        #[arg(long)]
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
    },
}

pub fn execute(cmd: &SignalCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        SignalCommands::Ingest {
            snippet,
            source,
            urgency,
        } => {
            let source: SignalSource = source.parse()?;
            let signal = Signal::new(&ctx.config.org_id, source, snippet.as_str(), *urgency);
            let signal = ctx.api.with_pipeline(|p| p.ingest_signal(signal))?;
            println!("Signal {} ingested ({}).", signal.signal_id, signal.source);
        }

        SignalCommands::List {
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
            let listing = ctx.block_on(ctx.api.list_signals(&query))?;
            if listing.items.is_empty() {
                println!("No signals.");
                return Ok(());
            }
            println!(
                "{:<10} {:<18} {:<9} {:>7}  SNIPPET",
                "ID", "STATUS", "SOURCE", "URGENCY"
            );
            println!("{}", "-".repeat(80));
            for s in &listing.items {
                println!(
                    "{:<10} {:<18} {:<9} {:>7.2}  {}",
                    short(s.signal_id),
                    s.status.to_string(),
                    s.source.to_string(),
                    s.urgency_score,
                    clip(&s.snippet, 40),
                );
            }
            println!(
                "\nPage {} · {} of {} signal(s).",
                listing.page,
                listing.items.len(),
                listing.total
            );
        }

        SignalCommands::Triage { id } => {
            let id = parse_id(id)?;
            let signal = ctx
                .api
                .with_pipeline(|p| p.transition_signal(id, SignalStatus::Triaged))?;
            println!("Signal {} is now {}.", signal.signal_id, signal.status);
        }

        SignalCommands::Ignore { id } => {
            let id = parse_id(id)?;
            let signal = ctx
                .api
                .with_pipeline(|p| p.transition_signal(id, SignalStatus::Ignored))?;
            println!("Signal {} is now {}.", signal.signal_id, signal.status);
        }

        SignalCommands::Enrich {
            id,
            contact,
            client,
            cluster,
            cluster_count,
            urgency,
        } => {
            let id = parse_id(id)?;
            let enrichment = SignalEnrichment {
                contact_id: contact.clone(),
                client_id: client.clone(),
                cluster_id: cluster.clone(),
                cluster_count: *cluster_count,
                urgency_score: *urgency,
            };
            let signal = ctx.api.with_pipeline(|p| p.enrich_signal(id, enrichment))?;
            println!(
                "Signal {} enriched (urgency {:.2}).",
                signal.signal_id, signal.urgency_score
            );
        }

        SignalCommands::Convert {
            id,
            title,
            value_band,
            confidence,
            contact_name,
            contact_email,
        } => {
            let id = parse_id(id)?;
            let value_band: ValueBand = value_band.parse()?;
            let input = NewCandidate {
                title: title.clone(),
                value_band,
                contact: ContactInfo {
                    name: contact_name.clone(),
                    email: contact_email.clone(),
                    phone: None,
                },
                confidence: *confidence,
            };
            let candidate = ctx.block_on(ctx.api.create_candidate_from_signal(id, input))?;
            println!(
                "Candidate {} created from signal {}.",
                candidate.candidate_id, id
            );
        }
    }

    Ok(())
}
