// stats.rs — Pipeline counts and forecast.

use std::collections::BTreeMap;

use ws_client::WorkstreamApi;
use ws_today::TierFilter;

use super::Context;

pub fn execute(tier: Option<&str>, json: bool, ctx: &Context) -> anyhow::Result<()> {
    let tier = tier.map(str::parse::<TierFilter>).transpose()?;
    let stats = ctx.block_on(ctx.api.stats(tier))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    print_counts("Signals", &stats.signals);
    print_counts("Candidates", &stats.candidates);
    print_counts("Pursuits", &stats.pursuits);
    println!();
    println!("Ready to promote:   {}", stats.ready_to_promote);
    println!("Open SLA breaches:  {}", stats.open_breaches);
    println!("Open forecast:      {:.0}", stats.forecast_total);
    println!("Weighted forecast:  {:.0}", stats.weighted_forecast);
    Ok(())
}

fn print_counts(label: &str, counts: &BTreeMap<String, usize>) {
    let total: usize = counts.values().sum();
    let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{} {}", v, k)).collect();
    if parts.is_empty() {
        println!("{:<12} 0", label);
    } else {
        println!("{:<12} {} ({})", label, total, parts.join(", "));
    }
}
