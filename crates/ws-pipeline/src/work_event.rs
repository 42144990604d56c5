// work_event.rs — WorkEvent: append-only audit/outbox record of a state change.
//
// Every mutation the pipeline performs produces one WorkEvent. Payloads are a
// closed tagged enum so each event code's shape is known statically.
// A WorkEvent is never edited except to mark it processed or to record a
// failed delivery attempt (retry count, next attempt time, last error).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::EntityKind;

/// Event payloads, one variant per event code.
///
/// `#[serde(tag = "event")]` serializes as `{"event": "candidate_promoted", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkEventPayload {
    SignalIngested {
        source: String,
        urgency_score: f64,
    },
    SignalStatusChanged {
        from: String,
        to: String,
    },
    SignalEnriched {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contact_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },
    CandidateCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signal_id: Option<Uuid>,
        title: String,
    },
    CandidateStatusChanged {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    CandidatePromoted {
        pursuit_id: Uuid,
    },
    PursuitStageChanged {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    ChecklistItemUpdated {
        item_id: Uuid,
        name: String,
        completed: bool,
    },
    ProposalStatusChanged {
        version: u32,
        from: String,
        to: String,
    },
    /// Side effect: ask the drip dispatcher to run the candidate's sequence.
    DripRequested {
        candidate_id: Uuid,
    },
    DripStatusChanged {
        schedule_id: Uuid,
        from: String,
        to: String,
    },
    SlaBreached {
        rule_name: String,
        hours_over: f64,
    },
}

impl WorkEventPayload {
    /// The stable event code.
    pub fn event_name(&self) -> &'static str {
        match self {
            WorkEventPayload::SignalIngested { .. } => "signal_ingested",
            WorkEventPayload::SignalStatusChanged { .. } => "signal_status_changed",
            WorkEventPayload::SignalEnriched { .. } => "signal_enriched",
            WorkEventPayload::CandidateCreated { .. } => "candidate_created",
            WorkEventPayload::CandidateStatusChanged { .. } => "candidate_status_changed",
            WorkEventPayload::CandidatePromoted { .. } => "candidate_promoted",
            WorkEventPayload::PursuitStageChanged { .. } => "pursuit_stage_changed",
            WorkEventPayload::ChecklistItemUpdated { .. } => "checklist_item_updated",
            WorkEventPayload::ProposalStatusChanged { .. } => "proposal_status_changed",
            WorkEventPayload::DripRequested { .. } => "drip_requested",
            WorkEventPayload::DripStatusChanged { .. } => "drip_status_changed",
            WorkEventPayload::SlaBreached { .. } => "sla_breached",
        }
    }

    /// Whether this event drives an external side effect (and therefore
    /// needs delivery with retry), as opposed to being a pure audit record.
    pub fn has_side_effect(&self) -> bool {
        matches!(self, WorkEventPayload::DripRequested { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkEvent {
    pub event_id: Uuid,
    pub org_id: String,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,

    /// Same as `payload.event_name()`; stored for readers that only scan names.
    pub event_name: String,

    pub payload: WorkEventPayload,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WorkEvent {
    pub fn new(
        org_id: impl Into<String>,
        entity_type: EntityKind,
        entity_id: Uuid,
        payload: WorkEventPayload,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            org_id: org_id.into(),
            entity_type,
            entity_id,
            event_name: payload.event_name().to_string(),
            payload,
            created_at: Utc::now(),
            processed_at: None,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        self.processed_at = Some(at);
        self.next_retry_at = None;
    }

    /// Record a failed delivery attempt.
    pub fn record_retry(&mut self, error: impl Into<String>, next_retry_at: Option<DateTime<Utc>>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
        self.next_retry_at = next_retry_at;
    }
}
