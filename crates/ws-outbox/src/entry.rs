// entry.rs — One line of the outbox log.
//
// The log never rewrites a line. An event's delivery history is the sequence
// of entries that mention it: enqueued, zero or more failed attempts, then
// processed or dead-lettered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::WorkEvent;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboxRecord {
    Enqueued {
        event: Box<WorkEvent>,
    },
    Attempted {
        event_id: Uuid,
        error: String,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    Processed {
        event_id: Uuid,
    },
    DeadLettered {
        event_id: Uuid,
        error: String,
        retry_count: u32,
    },
}

impl OutboxRecord {
    pub fn event_id(&self) -> Uuid {
        match self {
            OutboxRecord::Enqueued { event } => event.event_id,
            OutboxRecord::Attempted { event_id, .. }
            | OutboxRecord::Processed { event_id }
            | OutboxRecord::DeadLettered { event_id, .. } => *event_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboxEntry {
    pub recorded_at: DateTime<Utc>,
    pub record: OutboxRecord,
    /// Hash of the previous raw line; `None` for the first entry.
    pub previous_hash: Option<String>,
}

impl OutboxEntry {
    pub fn new(record: OutboxRecord, recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            record,
            previous_hash: None,
        }
    }
}
