// lifecycle.rs — Closed transition tables shared by every pipeline entity.
//
// Each status/stage enum lists its legal targets explicitly. There are no
// wildcard transitions: anything not in a state's target set is rejected
// with `InvalidTransition`, naming the disallowed pair. Terminal states have
// an empty target set.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// The kind of record a status, event or error refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Signal,
    Candidate,
    Pursuit,
    Proposal,
    ChecklistItem,
    DripSchedule,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Signal => "signal",
            EntityKind::Candidate => "candidate",
            EntityKind::Pursuit => "pursuit",
            EntityKind::Proposal => "proposal",
            EntityKind::ChecklistItem => "checklist_item",
            EntityKind::DripSchedule => "drip_schedule",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finite status type with a closed transition table.
pub trait Lifecycle: Copy + Eq + fmt::Display + Sized + 'static {
    /// The entity this status belongs to (used in error messages and events).
    const ENTITY: EntityKind;

    /// Every value, in lifecycle order.
    const ALL: &'static [Self];

    /// Legal targets from this state. Empty for terminal states.
    fn targets(self) -> &'static [Self];

    fn is_terminal(self) -> bool {
        self.targets().is_empty()
    }

    fn can_transition_to(self, next: Self) -> bool {
        self.targets().contains(&next)
    }

    /// Parse the snake_case name produced by `Display`.
    fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|s| s.to_string() == name)
    }
}

/// Check a single transition against the table for `S`.
///
/// Returns the target on success so callers can write
/// `entity.status = check_transition(id, entity.status, to)?;`.
pub fn check_transition<S: Lifecycle>(id: Uuid, from: S, to: S) -> Result<S, PipelineError> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(PipelineError::InvalidTransition {
            entity: S::ENTITY,
            id,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Parse a status name for `S`, rejecting unknown names as a validation error.
pub fn parse_status<S: Lifecycle>(name: &str) -> Result<S, PipelineError> {
    S::parse(name).ok_or_else(|| PipelineError::Validation {
        field: "status",
        reason: format!(
            "unknown {} status '{}' (expected one of: {})",
            S::ENTITY,
            name,
            S::ALL
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}
