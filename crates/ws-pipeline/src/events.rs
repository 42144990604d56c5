// events.rs — WorkEvent notification dispatch.
//
// The pipeline emits one WorkEvent per mutation. Sinks (the JSONL event log,
// the outbox, test collectors) subscribe by being added to the dispatcher.
// A failing sink never blocks the mutation that produced the event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::work_event::WorkEvent;

/// Trait for receiving work events.
pub trait NotificationSink: Send {
    /// Handle an event. Errors are logged but don't stop the pipeline.
    fn send(&self, event: &WorkEvent) -> Result<(), PipelineError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &WorkEvent) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PipelineError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| PipelineError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| PipelineError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Dispatches events to every registered sink.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn dispatch(&self, event: &WorkEvent) {
        tracing::debug!(
            event = %event.event_name,
            entity = %event.entity_type,
            entity_id = %event.entity_id,
            "dispatching work event"
        );
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!("notification sink error: {}", e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::EntityKind;
    use crate::work_event::WorkEventPayload;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn event(title: &str) -> WorkEvent {
        WorkEvent::new(
            "org-1",
            EntityKind::Candidate,
            Uuid::new_v4(),
            WorkEventPayload::CandidateCreated {
                signal_id: None,
                title: title.to_string(),
            },
        )
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn send(&self, _event: &WorkEvent) -> Result<(), PipelineError> {
            Err(PipelineError::NotificationError("down".into()))
        }
    }

    #[test]
    fn log_sink_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let sink = LogSink::new(&path);

        sink.send(&event("one")).unwrap();
        sink.send(&event("two")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(FailingSink));
        dispatcher.add_sink(Box::new(LogSink::new(&path)));
        dispatcher.dispatch(&event("x"));

        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("candidate_created"));
    }
}
