// panel.rs — The Today panel: filter, rank, group by tier, count.
//
// The panel is rebuilt from scratch on every refresh; a `PanelView` is a
// complete snapshot and is never patched in place.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TodayError;
use crate::item::{ItemKind, PriorityTier, WorkItem};
use crate::priority::{is_ready_to_promote, rank, PriorityConfig};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    All,
    Signal,
    Candidate,
    Pursuit,
}

impl KindFilter {
    pub fn matches(self, kind: ItemKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Signal => kind == ItemKind::Signal,
            KindFilter::Candidate => kind == ItemKind::Candidate,
            KindFilter::Pursuit => kind == ItemKind::Pursuit,
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KindFilter::All => "all",
            KindFilter::Signal => "signal",
            KindFilter::Candidate => "candidate",
            KindFilter::Pursuit => "pursuit",
        })
    }
}

impl FromStr for KindFilter {
    type Err = TodayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(KindFilter::All),
            "signal" | "signals" => Ok(KindFilter::Signal),
            "candidate" | "candidates" => Ok(KindFilter::Candidate),
            "pursuit" | "pursuits" => Ok(KindFilter::Pursuit),
            other => Err(TodayError::UnknownFilter {
                filter: "type",
                value: other.to_string(),
                expected: "all, signal, candidate, pursuit",
            }),
        }
    }
}

/// Tier selection. `All` and an unset filter behave the same.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TierFilter {
    All,
    Only(PriorityTier),
}

impl TierFilter {
    pub fn matches(self, tier: Option<PriorityTier>) -> bool {
        match self {
            TierFilter::All => true,
            TierFilter::Only(wanted) => tier == Some(wanted),
        }
    }
}

impl fmt::Display for TierFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierFilter::All => f.write_str("all"),
            TierFilter::Only(tier) => write!(f, "{}", tier),
        }
    }
}

impl FromStr for TierFilter {
    type Err = TodayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(TierFilter::All),
            other => other
                .parse::<PriorityTier>()
                .map(TierFilter::Only)
                .map_err(|_| TodayError::UnknownFilter {
                    filter: "tier",
                    value: other.to_string(),
                    expected: "all, critical, high, medium, low",
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct PanelFilter {
    #[serde(default)]
    pub kind: KindFilter,
    #[serde(default)]
    pub tier: Option<TierFilter>,
}

impl PanelFilter {
    pub fn new(kind: KindFilter, tier: Option<TierFilter>) -> Self {
        Self { kind, tier }
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        self.kind.matches(item.kind)
            && self.tier.is_none_or(|t| t.matches(item.priority_tier))
    }

    /// Identity used for last-request-wins refresh. Unset and `all` tier
    /// filters produce the same key.
    pub fn key(&self) -> String {
        format!(
            "type={};tier={}",
            self.kind,
            self.tier.unwrap_or(TierFilter::All)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unassigned: usize,
}

impl TierCounts {
    fn bump(&mut self, tier: Option<PriorityTier>) {
        match tier {
            Some(PriorityTier::Critical) => self.critical += 1,
            Some(PriorityTier::High) => self.high += 1,
            Some(PriorityTier::Medium) => self.medium += 1,
            Some(PriorityTier::Low) => self.low += 1,
            None => self.unassigned += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.unassigned
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierGroup {
    /// `None` is the "unassigned" group.
    pub tier: Option<PriorityTier>,
    pub items: Vec<WorkItem>,
}

impl TierGroup {
    pub fn label(&self) -> &'static str {
        self.tier.map_or("unassigned", |t| t.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelView {
    pub filter: PanelFilter,
    /// Every matching item in rank order.
    pub items: Vec<WorkItem>,
    /// Critical, high, medium, low, unassigned; each in rank order.
    pub groups: Vec<TierGroup>,
    pub counts: TierCounts,
    /// The top ready-to-promote candidates.
    pub ready_to_promote: Vec<WorkItem>,
    /// How many matching items are ready to promote in total.
    pub ready_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl PanelView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn build_panel(items: Vec<WorkItem>, filter: &PanelFilter, config: &PriorityConfig) -> PanelView {
    let matching: Vec<WorkItem> = items.into_iter().filter(|i| filter.matches(i)).collect();
    let ranked = rank(matching, config);

    let mut counts = TierCounts::default();
    let mut groups: Vec<TierGroup> = PriorityTier::DESCENDING
        .iter()
        .map(|t| Some(*t))
        .chain(std::iter::once(None))
        .map(|tier| TierGroup {
            tier,
            items: Vec::new(),
        })
        .collect();

    for item in &ranked {
        counts.bump(item.priority_tier);
        if let Some(group) = groups.iter_mut().find(|g| g.tier == item.priority_tier) {
            group.items.push(item.clone());
        }
    }

    let ready: Vec<&WorkItem> = ranked
        .iter()
        .filter(|i| is_ready_to_promote(i, config))
        .collect();
    let ready_count = ready.len();
    let ready_to_promote = ready
        .into_iter()
        .take(config.ready_surfaced)
        .cloned()
        .collect();

    tracing::debug!(
        filter = %filter.key(),
        items = ranked.len(),
        ready = ready_count,
        "panel built"
    );

    PanelView {
        filter: *filter,
        items: ranked,
        groups,
        counts,
        ready_to_promote,
        ready_count,
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use ws_pipeline::IcpBand;

    fn cand(score: f64, tier: Option<PriorityTier>) -> WorkItem {
        let mut item = WorkItem::new(ItemKind::Candidate, Uuid::new_v4(), format!("c{score}"))
            .with_score(score)
            .with_icp_band(IcpBand::High);
        item.priority_tier = tier;
        item
    }

    #[test]
    fn groups_and_counts_by_tier() {
        let items = vec![
            cand(0.2, Some(PriorityTier::Low)),
            cand(0.9, Some(PriorityTier::Critical)),
            cand(0.5, None),
            cand(0.4, Some(PriorityTier::Critical)),
        ];
        let view = build_panel(items, &PanelFilter::default(), &PriorityConfig::default());
        assert_eq!(view.counts.critical, 2);
        assert_eq!(view.counts.low, 1);
        assert_eq!(view.counts.unassigned, 1);
        assert_eq!(view.counts.total(), 4);
        assert_eq!(view.groups.len(), 5);
        assert_eq!(view.groups[0].label(), "critical");
        assert_eq!(view.groups[0].items.len(), 2);
        assert_eq!(view.groups[4].label(), "unassigned");
    }

    #[test]
    fn tier_filter_narrows() {
        let items = vec![
            cand(0.2, Some(PriorityTier::Low)),
            cand(0.9, Some(PriorityTier::Critical)),
        ];
        let filter = PanelFilter::new(KindFilter::All, Some(TierFilter::Only(PriorityTier::Low)));
        let view = build_panel(items, &filter, &PriorityConfig::default());
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.counts.low, 1);
    }

    #[test]
    fn ready_to_promote_surfaces_top_three_and_counts_all() {
        let items = (0..5)
            .map(|i| cand(0.8 + f64::from(i) * 0.04, Some(PriorityTier::High)))
            .collect();
        let view = build_panel(items, &PanelFilter::default(), &PriorityConfig::default());
        assert_eq!(view.ready_count, 5);
        assert_eq!(view.ready_to_promote.len(), 3);
        assert_eq!(view.ready_to_promote[0], view.items[0]);
    }

    #[test]
    fn filter_keys_treat_unset_tier_as_all() {
        let unset = PanelFilter::new(KindFilter::Candidate, None);
        let all = PanelFilter::new(KindFilter::Candidate, Some(TierFilter::All));
        assert_eq!(unset.key(), all.key());
        assert_ne!(unset.key(), PanelFilter::default().key());
    }

    #[test]
    fn parses_filters() {
        assert_eq!("candidates".parse::<KindFilter>().unwrap(), KindFilter::Candidate);
        assert_eq!(
            "high".parse::<TierFilter>().unwrap(),
            TierFilter::Only(PriorityTier::High)
        );
        assert!("urgent".parse::<TierFilter>().is_err());
    }
}
