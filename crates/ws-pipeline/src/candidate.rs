// candidate.rs — Candidate: a qualified opportunity pending promotion.
//
// Transition table:
//   new      → triaged | archived
//   triaged  → nurture | on_hold | promoted | archived
//   nurture  → on_hold | promoted | archived
//   on_hold  → nurture | promoted | archived
//   promoted, archived → (terminal)
//
// Candidates are never deleted; `archived` is the soft-terminal end.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Triaged,
    Nurture,
    OnHold,
    Promoted,
    Archived,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::New => "new",
            CandidateStatus::Triaged => "triaged",
            CandidateStatus::Nurture => "nurture",
            CandidateStatus::OnHold => "on_hold",
            CandidateStatus::Promoted => "promoted",
            CandidateStatus::Archived => "archived",
        }
    }

    /// Promotion is legal from `triaged` or later, but not from a terminal state.
    pub fn is_promotable(&self) -> bool {
        matches!(
            self,
            CandidateStatus::Triaged | CandidateStatus::Nurture | CandidateStatus::OnHold
        )
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status(s)
    }
}

impl Lifecycle for CandidateStatus {
    const ENTITY: EntityKind = EntityKind::Candidate;
    const ALL: &'static [Self] = &[
        CandidateStatus::New,
        CandidateStatus::Triaged,
        CandidateStatus::Nurture,
        CandidateStatus::OnHold,
        CandidateStatus::Promoted,
        CandidateStatus::Archived,
    ];

    fn targets(self) -> &'static [Self] {
        use CandidateStatus::*;
        match self {
            New => &[Triaged, Archived],
            Triaged => &[Nurture, OnHold, Promoted, Archived],
            Nurture => &[OnHold, Promoted, Archived],
            OnHold => &[Nurture, Promoted, Archived],
            Promoted | Archived => &[],
        }
    }
}

/// Expected deal size bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ValueBand {
    Small,
    Medium,
    Large,
    Enterprise,
}

impl ValueBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueBand::Small => "small",
            ValueBand::Medium => "medium",
            ValueBand::Large => "large",
            ValueBand::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for ValueBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueBand {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "small" => Ok(ValueBand::Small),
            "medium" => Ok(ValueBand::Medium),
            "large" => Ok(ValueBand::Large),
            "enterprise" => Ok(ValueBand::Enterprise),
            other => Err(PipelineError::Validation {
                field: "value_band",
                reason: format!("unknown value band '{}'", other),
            }),
        }
    }
}

/// Ideal Customer Profile fit classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IcpBand {
    High,
    Medium,
    Low,
}

impl IcpBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            IcpBand::High => "high",
            IcpBand::Medium => "medium",
            IcpBand::Low => "low",
        }
    }
}

impl fmt::Display for IcpBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IcpBand {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high" => Ok(IcpBand::High),
            "medium" => Ok(IcpBand::Medium),
            "low" => Ok(IcpBand::Low),
            other => Err(PipelineError::Validation {
                field: "icp_band",
                reason: format!("unknown ICP band '{}'", other),
            }),
        }
    }
}

/// ICP score summary attached by the scoring provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IcpSummary {
    /// 0–100.
    pub score: f64,
    pub band: IcpBand,
}

/// Contact details captured when a candidate is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Input for creating a candidate, with or without an origin signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCandidate {
    pub title: String,
    pub value_band: ValueBand,
    #[serde(default)]
    pub contact: ContactInfo,
    /// 0–100. Defaults to 50 when the caller has no estimate.
    #[serde(default = "default_confidence")]
    pub confidence: u8,
}

fn default_confidence() -> u8 {
    50
}

/// A qualified opportunity derived from zero or one Signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: Uuid,
    pub org_id: String,

    pub title: String,
    pub value_band: ValueBand,

    /// 0–100.
    pub confidence: u8,

    pub status: CandidateStatus,

    /// Last time anyone acted on this candidate (drives the response SLA).
    pub last_touch_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icp: Option<IcpSummary>,

    #[serde(default)]
    pub contact: ContactInfo,

    /// Originating signal (lookup only; no cascade).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,

    /// Pursuit created by promotion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pursuit_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a new candidate in the `new` state.
    pub fn new(org_id: impl Into<String>, input: NewCandidate) -> Result<Self, PipelineError> {
        if input.title.trim().is_empty() {
            return Err(PipelineError::Validation {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if input.confidence > 100 {
            return Err(PipelineError::Validation {
                field: "confidence",
                reason: format!("{} is outside 0–100", input.confidence),
            });
        }
        let now = Utc::now();
        Ok(Self {
            candidate_id: Uuid::new_v4(),
            org_id: org_id.into(),
            title: input.title,
            value_band: input.value_band,
            confidence: input.confidence,
            status: CandidateStatus::New,
            last_touch_at: now,
            icp: None,
            contact: input.contact,
            signal_id: None,
            promoted_at: None,
            pursuit_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Transition to a new status. Every successful transition counts as a touch.
    pub fn transition(&mut self, to: CandidateStatus) -> Result<(), PipelineError> {
        self.status = check_transition(self.candidate_id, self.status, to)?;
        self.touch();
        Ok(())
    }

    /// Mark promoted and link the pursuit. Fails unless the candidate is promotable.
    pub fn promote(&mut self, pursuit_id: Uuid) -> Result<(), PipelineError> {
        if !self.status.is_promotable() {
            return Err(PipelineError::InvalidTransition {
                entity: EntityKind::Candidate,
                id: self.candidate_id,
                from: self.status.to_string(),
                to: CandidateStatus::Promoted.to_string(),
            });
        }
        self.transition(CandidateStatus::Promoted)?;
        self.promoted_at = Some(self.updated_at);
        self.pursuit_id = Some(pursuit_id);
        Ok(())
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_touch_at = now;
        self.updated_at = now;
    }
}
