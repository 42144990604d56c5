// item.rs — WorkItem: the common shape every entity takes on the Today panel.
//
// Items arrive from the collaborator partially filled in: score, tier, badge
// and ICP band may each be absent. Absent fields rank lowest on their key and
// never cause an item to be dropped.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::IcpBand;
use ws_sla::SlaBadge;

use crate::error::TodayError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Signal,
    Candidate,
    Pursuit,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Signal => "signal",
            ItemKind::Candidate => "candidate",
            ItemKind::Pursuit => "pursuit",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency tier. Ordered so `Critical` is the greatest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityTier {
    /// Panel display order.
    pub const DESCENDING: [PriorityTier; 4] = [
        PriorityTier::Critical,
        PriorityTier::High,
        PriorityTier::Medium,
        PriorityTier::Low,
    ];

    /// critical=4, high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            PriorityTier::Low => 1,
            PriorityTier::Medium => 2,
            PriorityTier::High => 3,
            PriorityTier::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Low => "low",
            PriorityTier::Medium => "medium",
            PriorityTier::High => "high",
            PriorityTier::Critical => "critical",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityTier {
    type Err = TodayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "critical" => Ok(PriorityTier::Critical),
            "high" => Ok(PriorityTier::High),
            "medium" => Ok(PriorityTier::Medium),
            "low" => Ok(PriorityTier::Low),
            other => Err(TodayError::UnknownFilter {
                filter: "tier",
                value: other.to_string(),
                expected: "critical, high, medium, low",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub kind: ItemKind,
    pub id: Uuid,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,

    /// Raw score; 0–1 or the 0–200 collaborator scale.
    #[serde(default)]
    pub priority_score: Option<f64>,
    #[serde(default)]
    pub priority_tier: Option<PriorityTier>,
    #[serde(default)]
    pub sla_badge: Option<SlaBadge>,
    /// Candidates only.
    #[serde(default)]
    pub icp_band: Option<IcpBand>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(kind: ItemKind, id: Uuid, title: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            org_id: String::new(),
            title: title.into(),
            status: String::new(),
            priority_score: None,
            priority_tier: None,
            sla_badge: None,
            icp_band: None,
            due_at: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.priority_score = Some(score);
        self
    }

    pub fn with_tier(mut self, tier: PriorityTier) -> Self {
        self.priority_tier = Some(tier);
        self
    }

    pub fn with_badge(mut self, badge: SlaBadge) -> Self {
        self.sla_badge = Some(badge);
        self
    }

    pub fn with_icp_band(mut self, band: IcpBand) -> Self {
        self.icp_band = Some(band);
        self
    }

    /// Score on the 0–1 scale. Values above 1.0 are taken to be on the
    /// 0–200 scale and divided down. NaN counts as missing.
    pub fn normalized_score(&self) -> Option<f64> {
        let raw = self.priority_score?;
        if raw.is_nan() {
            return None;
        }
        let scaled = if raw > 1.0 { raw / 200.0 } else { raw };
        Some(scaled.clamp(0.0, 1.0))
    }

    pub fn tier_rank(&self) -> u8 {
        self.priority_tier.map_or(0, PriorityTier::rank)
    }

    pub fn badge_rank(&self) -> u8 {
        self.sla_badge.map_or(0, SlaBadge::rank)
    }
}
