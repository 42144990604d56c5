// drip.rs — Scheduled nurture actions for a candidate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DripAction {
    Email,
    Task,
    Call,
}

impl fmt::Display for DripAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DripAction::Email => "email",
            DripAction::Task => "task",
            DripAction::Call => "call",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DripStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl DripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DripStatus::Pending => "pending",
            DripStatus::Sent => "sent",
            DripStatus::Failed => "failed",
            DripStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for DripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DripStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status(s)
    }
}

impl Lifecycle for DripStatus {
    const ENTITY: EntityKind = EntityKind::DripSchedule;
    const ALL: &'static [Self] = &[
        DripStatus::Pending,
        DripStatus::Sent,
        DripStatus::Failed,
        DripStatus::Skipped,
    ];

    fn targets(self) -> &'static [Self] {
        match self {
            DripStatus::Pending => &[DripStatus::Sent, DripStatus::Failed, DripStatus::Skipped],
            // A failed step may be rescheduled.
            DripStatus::Failed => &[DripStatus::Pending],
            DripStatus::Sent | DripStatus::Skipped => &[],
        }
    }
}

/// One step of a nurture sequence, relative to the sequence start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DripStep {
    pub day_offset: u32,
    pub action: DripAction,
}

/// Default nurture cadence: email now, follow-up task, then a call.
pub fn default_sequence() -> Vec<DripStep> {
    vec![
        DripStep {
            day_offset: 0,
            action: DripAction::Email,
        },
        DripStep {
            day_offset: 3,
            action: DripAction::Task,
        },
        DripStep {
            day_offset: 7,
            action: DripAction::Call,
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripSchedule {
    pub schedule_id: Uuid,
    pub candidate_id: Uuid,
    pub org_id: String,
    pub action: DripAction,
    pub day_offset: u32,
    pub scheduled_at: DateTime<Utc>,
    pub status: DripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DripSchedule {
    /// Expand a sequence into concrete schedule rows starting at `start`.
    pub fn plan(
        candidate_id: Uuid,
        org_id: &str,
        start: DateTime<Utc>,
        steps: &[DripStep],
    ) -> Vec<DripSchedule> {
        let now = Utc::now();
        steps
            .iter()
            .map(|step| DripSchedule {
                schedule_id: Uuid::new_v4(),
                candidate_id,
                org_id: org_id.to_string(),
                action: step.action,
                day_offset: step.day_offset,
                scheduled_at: start + Duration::days(i64::from(step.day_offset)),
                status: DripStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    pub fn transition(&mut self, to: DripStatus) -> Result<(), PipelineError> {
        self.status = check_transition(self.schedule_id, self.status, to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DripStatus::Pending && self.scheduled_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_offsets_from_start() {
        let start = Utc::now();
        let rows = DripSchedule::plan(Uuid::new_v4(), "org-1", start, &default_sequence());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].scheduled_at, start + Duration::days(3));
        assert!(rows.iter().all(|r| r.status == DripStatus::Pending));
        assert!(rows[0].is_due(start));
        assert!(!rows[2].is_due(start));
    }

    #[test]
    fn failed_steps_can_be_rescheduled_but_sent_is_final() {
        let mut row = DripSchedule::plan(Uuid::new_v4(), "org-1", Utc::now(), &default_sequence())
            .remove(0);
        row.transition(DripStatus::Failed).unwrap();
        row.transition(DripStatus::Pending).unwrap();
        row.transition(DripStatus::Sent).unwrap();
        assert!(row.transition(DripStatus::Pending).is_err());
    }
}
