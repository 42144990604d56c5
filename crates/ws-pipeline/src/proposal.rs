// proposal.rs — Versioned proposal documents attached to a pursuit.
//
// Versions increase monotonically per pursuit, starting at 1.
// Status: draft → review → sent → accepted | rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Review,
    Sent,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Review => "review",
            ProposalStatus::Sent => "sent",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status(s)
    }
}

impl Lifecycle for ProposalStatus {
    const ENTITY: EntityKind = EntityKind::Proposal;
    const ALL: &'static [Self] = &[
        ProposalStatus::Draft,
        ProposalStatus::Review,
        ProposalStatus::Sent,
        ProposalStatus::Accepted,
        ProposalStatus::Rejected,
    ];

    fn targets(self) -> &'static [Self] {
        match self {
            ProposalStatus::Draft => &[ProposalStatus::Review],
            ProposalStatus::Review => &[ProposalStatus::Sent],
            ProposalStatus::Sent => &[ProposalStatus::Accepted, ProposalStatus::Rejected],
            ProposalStatus::Accepted | ProposalStatus::Rejected => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: Uuid,
    pub pursuit_id: Uuid,
    pub org_id: String,
    pub version: u32,
    pub title: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Create the next version for a pursuit given its existing proposals.
    pub fn next_for(
        pursuit_id: Uuid,
        org_id: impl Into<String>,
        title: impl Into<String>,
        existing: &[Proposal],
    ) -> Self {
        let version = existing
            .iter()
            .filter(|p| p.pursuit_id == pursuit_id)
            .map(|p| p.version)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        Self {
            proposal_id: Uuid::new_v4(),
            pursuit_id,
            org_id: org_id.into(),
            version,
            title: title.into(),
            status: ProposalStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, to: ProposalStatus) -> Result<(), PipelineError> {
        self.status = check_transition(self.proposal_id, self.status, to)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
