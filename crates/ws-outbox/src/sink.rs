// sink.rs — Feed side-effect work events from the pipeline into the outbox.

use std::sync::{Arc, Mutex};

use ws_pipeline::{NotificationSink, PipelineError, WorkEvent};

use crate::outbox::Outbox;

/// Enqueues every event whose payload drives an external side effect.
/// Pure audit events are left to the event log.
#[derive(Clone)]
pub struct OutboxSink {
    outbox: Arc<Mutex<Outbox>>,
}

impl OutboxSink {
    pub fn new(outbox: Arc<Mutex<Outbox>>) -> Self {
        Self { outbox }
    }
}

impl NotificationSink for OutboxSink {
    fn send(&self, event: &WorkEvent) -> Result<(), PipelineError> {
        if !event.payload.has_side_effect() {
            return Ok(());
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| PipelineError::NotificationError("outbox lock poisoned".into()))?;
        outbox
            .enqueue(event.clone())
            .map_err(|e| PipelineError::NotificationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use tempfile::tempdir;
    use uuid::Uuid;
    use ws_pipeline::{EntityKind, WorkEventPayload};

    #[test]
    fn only_side_effects_are_enqueued() {
        let dir = tempdir().unwrap();
        let outbox = Arc::new(Mutex::new(
            Outbox::open(dir.path().join("outbox.jsonl"), RetryPolicy::default()).unwrap(),
        ));
        let sink = OutboxSink::new(outbox.clone());

        let candidate_id = Uuid::new_v4();
        sink.send(&WorkEvent::new(
            "org-1",
            EntityKind::Candidate,
            candidate_id,
            WorkEventPayload::CandidatePromoted {
                pursuit_id: Uuid::new_v4(),
            },
        ))
        .unwrap();
        sink.send(&WorkEvent::new(
            "org-1",
            EntityKind::Candidate,
            candidate_id,
            WorkEventPayload::DripRequested { candidate_id },
        ))
        .unwrap();

        let outbox = outbox.lock().unwrap();
        assert_eq!(outbox.pending().len(), 1);
        assert_eq!(outbox.pending()[0].event_name, "drip_requested");
    }
}
