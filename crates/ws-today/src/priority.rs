// priority.rs — Composite ranking of heterogeneous work items.
//
// Ordering keys, most significant first:
//   1. score, but only when two scores differ by more than the dead-band
//   2. tier rank (critical=4 … low=1, missing=0), descending
//   3. SLA badge rank (red=3, amber=2, green=1, missing=0), descending
//   4. original position
//
// A pairwise "scores within 0.1 are equal" comparison is not transitive
// (0.80 ≈ 0.72 ≈ 0.64 but 0.80 ≠ 0.64), so items are first split into score
// bands: walking scores in descending order, each band is led by its highest
// score and admits every later score within the dead-band of that leader.
// Unscored items form the last band. Sorting by (band, tier, badge, position)
// is then an ordinary lexicographic sort.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use ws_pipeline::IcpBand;

use crate::error::TodayError;
use crate::item::{ItemKind, WorkItem};

pub const DEFAULT_DEAD_BAND: f64 = 0.1;
pub const DEFAULT_READY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_READY_SURFACED: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityConfig {
    /// Score differences at or below this are not decisive.
    #[serde(default = "default_dead_band")]
    pub dead_band: f64,

    /// Minimum normalized score for a high-ICP candidate to be ready to promote.
    #[serde(default = "default_ready_threshold")]
    pub ready_threshold: f64,

    /// How many ready-to-promote candidates the panel surfaces.
    #[serde(default = "default_ready_surfaced")]
    pub ready_surfaced: usize,
}

fn default_dead_band() -> f64 {
    DEFAULT_DEAD_BAND
}

fn default_ready_threshold() -> f64 {
    DEFAULT_READY_THRESHOLD
}

fn default_ready_surfaced() -> usize {
    DEFAULT_READY_SURFACED
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            dead_band: DEFAULT_DEAD_BAND,
            ready_threshold: DEFAULT_READY_THRESHOLD,
            ready_surfaced: DEFAULT_READY_SURFACED,
        }
    }
}

impl PriorityConfig {
    pub fn validate(&self) -> Result<(), TodayError> {
        if !(0.0..=1.0).contains(&self.dead_band) {
            return Err(TodayError::InvalidConfig(format!(
                "dead_band must be within 0–1, got {}",
                self.dead_band
            )));
        }
        if !(0.0..=1.0).contains(&self.ready_threshold) {
            return Err(TodayError::InvalidConfig(format!(
                "ready_threshold must be within 0–1, got {}",
                self.ready_threshold
            )));
        }
        Ok(())
    }
}

/// Assign each item its score band. Index-aligned with `items`.
fn score_bands(items: &[WorkItem], dead_band: f64) -> Vec<usize> {
    let mut scored: Vec<(usize, f64)> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.normalized_score().map(|s| (i, s)))
        .collect();
    // Descending score; ties keep input order so banding is deterministic.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut bands = vec![usize::MAX; items.len()];
    let mut band = 0usize;
    let mut leader: Option<f64> = None;
    for (i, score) in scored {
        match leader {
            Some(lead) if lead - score <= dead_band => {}
            Some(_) => {
                band += 1;
                leader = Some(score);
            }
            None => leader = Some(score),
        }
        bands[i] = band;
    }
    bands
}

/// Rank items. Stable: equal keys keep their input order.
pub fn rank(items: Vec<WorkItem>, config: &PriorityConfig) -> Vec<WorkItem> {
    let bands = score_bands(&items, config.dead_band);
    let mut keyed: Vec<_> = items
        .into_iter()
        .enumerate()
        .map(|(pos, item)| {
            let key = (
                bands[pos],
                Reverse(item.tier_rank()),
                Reverse(item.badge_rank()),
                pos,
            );
            (key, item)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, item)| item).collect()
}

/// Candidates with a high ICP band whose normalized score meets the threshold.
pub fn is_ready_to_promote(item: &WorkItem, config: &PriorityConfig) -> bool {
    item.kind == ItemKind::Candidate
        && item.icp_band == Some(IcpBand::High)
        && item
            .normalized_score()
            .is_some_and(|s| s >= config.ready_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::PriorityTier;
    use uuid::Uuid;
    use ws_sla::SlaBadge;

    fn item(title: &str) -> WorkItem {
        WorkItem::new(ItemKind::Candidate, Uuid::new_v4(), title)
    }

    fn titles(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn dead_band_defers_to_tier() {
        let a = item("a").with_score(0.81).with_tier(PriorityTier::Low);
        let b = item("b").with_score(0.75).with_tier(PriorityTier::Critical);
        let ranked = rank(vec![a, b], &PriorityConfig::default());
        assert_eq!(titles(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn scores_outside_dead_band_decide() {
        let a = item("a").with_score(0.95).with_tier(PriorityTier::Low);
        let b = item("b").with_score(0.5).with_tier(PriorityTier::Critical);
        let ranked = rank(vec![b, a], &PriorityConfig::default());
        assert_eq!(titles(&ranked), vec!["a", "b"]);
    }

    #[test]
    fn badge_breaks_tier_ties_then_position() {
        let a = item("a").with_score(0.5).with_tier(PriorityTier::High);
        let b = item("b")
            .with_score(0.52)
            .with_tier(PriorityTier::High)
            .with_badge(SlaBadge::Red);
        let c = item("c").with_score(0.55).with_tier(PriorityTier::High);
        let ranked = rank(vec![a, b, c], &PriorityConfig::default());
        assert_eq!(titles(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn chained_scores_band_from_leader() {
        // 0.80 and 0.72 share a band; 0.64 is more than 0.1 below the leader.
        let a = item("a").with_score(0.80).with_tier(PriorityTier::Low);
        let b = item("b").with_score(0.72).with_tier(PriorityTier::High);
        let c = item("c").with_score(0.64).with_tier(PriorityTier::Critical);
        let ranked = rank(vec![a, b, c], &PriorityConfig::default());
        assert_eq!(titles(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn unscored_items_rank_last_but_are_kept() {
        let a = item("a").with_tier(PriorityTier::Critical);
        let b = item("b").with_score(0.1);
        let ranked = rank(vec![a, b], &PriorityConfig::default());
        assert_eq!(titles(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn ranking_is_idempotent_and_order_independent() {
        let tiers = [
            None,
            Some(PriorityTier::Low),
            Some(PriorityTier::Medium),
            Some(PriorityTier::High),
            Some(PriorityTier::Critical),
        ];
        let badges = [None, Some(SlaBadge::Green), Some(SlaBadge::Amber), Some(SlaBadge::Red)];
        let mut items = Vec::new();
        for i in 0..40 {
            let mut it = item(&format!("i{i}"));
            if i % 7 != 0 {
                it.priority_score = Some(((i * 37) % 100) as f64 / 100.0);
            }
            it.priority_tier = tiers[i % tiers.len()];
            it.sla_badge = badges[i % badges.len()];
            items.push(it);
        }
        let config = PriorityConfig::default();
        let once = rank(items.clone(), &config);
        let twice = rank(once.clone(), &config);
        assert_eq!(titles(&once), titles(&twice));

        let mut reversed = items;
        reversed.reverse();
        let from_reversed = rank(reversed, &config);
        // Same band/tier/badge structure regardless of input order.
        let keys = |v: &[WorkItem]| {
            v.iter()
                .map(|i| (i.tier_rank(), i.badge_rank()))
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&once), keys(&from_reversed));
    }

    #[test]
    fn ready_to_promote_predicate() {
        let config = PriorityConfig::default();
        let flagged = item("x").with_score(0.82).with_icp_band(IcpBand::High);
        assert!(is_ready_to_promote(&flagged, &config));

        let low_score = item("x").with_score(0.79).with_icp_band(IcpBand::High);
        assert!(!is_ready_to_promote(&low_score, &config));

        let medium_icp = item("x").with_score(0.9).with_icp_band(IcpBand::Medium);
        assert!(!is_ready_to_promote(&medium_icp, &config));

        let mut pursuit = flagged.clone();
        pursuit.kind = ItemKind::Pursuit;
        assert!(!is_ready_to_promote(&pursuit, &config));

        // Collaborator scale: 164/200 = 0.82.
        let scaled = item("x").with_score(164.0).with_icp_band(IcpBand::High);
        assert!(is_ready_to_promote(&scaled, &config));
    }

    #[test]
    fn config_validation() {
        assert!(PriorityConfig::default().validate().is_ok());
        let bad = PriorityConfig {
            dead_band: 2.0,
            ..PriorityConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
