// mod.rs — Shared command context and argument helpers.

pub mod candidate;
pub mod outbox;
pub mod pursuit;
pub mod signal;
pub mod sla;
pub mod stats;
pub mod today;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use ws_client::{CommandLayer, LocalApi, WorkstreamConfig, WorkstreamPaths};

/// Everything a subcommand needs: resolved paths and config, the local
/// collaborator, the command layer over it and a runtime for async calls.
pub struct Context {
    pub paths: WorkstreamPaths,
    pub config: WorkstreamConfig,
    pub api: Arc<LocalApi>,
    pub commands: CommandLayer<LocalApi>,
    runtime: tokio::runtime::Runtime,
}

impl Context {
    pub fn open(project_root: &Path) -> anyhow::Result<Self> {
        let paths = WorkstreamPaths::for_project(project_root);
        let config = WorkstreamConfig::resolve(&paths)?;
        tracing::debug!(org = %config.org_id, root = %project_root.display(), "config resolved");
        let api = Arc::new(LocalApi::open(&paths, &config)?);
        let commands = CommandLayer::new(api.clone());
        let runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            paths,
            config,
            api,
            commands,
            runtime,
        })
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

pub fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid id '{}'", raw))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (end of day UTC).
pub fn parse_due(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid due date '{}' (expected YYYY-MM-DD)", raw))?;
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("invalid due date '{}'", raw))
}

pub fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Trim long text to `max` characters for table cells.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(max.saturating_sub(1)).collect();
        s.push('…');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_dates_accept_both_forms() {
        let day = parse_due("2026-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2026-03-01T23:59:59+00:00");
        let ts = parse_due("2026-03-01T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-01T10:00:00+00:00");
        assert!(parse_due("next week").is_err());
    }

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("a longer snippet", 8), "a longe…");
    }
}
