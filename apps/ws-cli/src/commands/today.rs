// today.rs — The Today panel: ranked work grouped by priority tier.

use clap::Args;
use ws_client::PanelFeed;
use ws_today::{KindFilter, PanelFilter, PanelView, TierFilter};

use super::{clip, short, Context};

#[derive(Args)]
pub struct TodayArgs {
    /// all, signal, candidate or pursuit.
    #[arg(long = "type", default_value = "all")]
    kind: String,
    /// all, critical, high, medium or low.
    #[arg(long)]
    tier: Option<String>,
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

pub fn execute(args: &TodayArgs, ctx: &Context) -> anyhow::Result<()> {
    let kind: KindFilter = args.kind.parse()?;
    let tier = args
        .tier
        .as_deref()
        .map(str::parse::<TierFilter>)
        .transpose()?;
    let filter = PanelFilter::new(kind, tier);

    let feed = PanelFeed::new(ctx.api.clone());
    let view = ctx.block_on(feed.refresh(filter))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(view.as_ref())?);
        return Ok(());
    }
    print_panel(&view);
    Ok(())
}

fn print_panel(view: &PanelView) {
    if view.is_empty() {
        println!("Nothing needs attention.");
        return;
    }

    if !view.ready_to_promote.is_empty() {
        println!("Ready to promote ({}):", view.ready_count);
        for item in &view.ready_to_promote {
            println!(
                "  {}  {:.2}  {}",
                short(item.id),
                item.normalized_score().unwrap_or(0.0),
                clip(&item.title, 60)
            );
        }
        println!();
    }

    for group in view.groups.iter().filter(|g| !g.items.is_empty()) {
        println!("{} ({})", group.label().to_uppercase(), group.items.len());
        for item in &group.items {
            println!(
                "  {:<9} {:<10} {:<17} {:>5} {:<5}  {}",
                item.kind.to_string(),
                short(item.id),
                item.status,
                item.normalized_score()
                    .map_or("-".to_string(), |s| format!("{:.2}", s)),
                item.sla_badge.map_or("-".to_string(), |b| b.to_string()),
                clip(&item.title, 40),
            );
        }
    }

    let c = &view.counts;
    println!(
        "\n{} item(s): {} critical, {} high, {} medium, {} low, {} unassigned.",
        c.total(),
        c.critical,
        c.high,
        c.medium,
        c.low,
        c.unassigned
    );
}
