// outbox.rs — Append-only, hash-chained queue of work events awaiting delivery.
//
// The outbox is a JSONL file. Each line is an `OutboxEntry` linked to the
// line before it by `previous_hash`. Opening the outbox replays the log to
// rebuild the in-memory queue:
//
//   pending   enqueued, not yet processed or dead-lettered
//   dead      exhausted their retry budget; surfaced for a human
//   processed delivered (ids only)
//
// Delivery itself is someone else's job: a worker asks for `due(now)`,
// attempts each event, then calls `mark_processed` or `record_failure`.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::WorkEvent;

use crate::entry::{OutboxEntry, OutboxRecord};
use crate::error::OutboxError;
use crate::hasher;
use crate::retry::RetryPolicy;

/// An event that ran out of retries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetter {
    pub event: WorkEvent,
    pub error: String,
    pub dead_at: DateTime<Utc>,
}

/// What happened to an event after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Rescheduled.
    Retry { next_retry_at: DateTime<Utc> },
    /// Retry budget exhausted.
    DeadLettered,
}

pub struct Outbox {
    writer: BufWriter<File>,
    path: PathBuf,
    last_hash: Option<String>,
    policy: RetryPolicy,
    pending: Vec<WorkEvent>,
    dead: Vec<DeadLetter>,
    processed: HashSet<Uuid>,
}

impl Outbox {
    /// Open (or create) the outbox at `path` and replay its history.
    pub fn open(path: impl AsRef<Path>, policy: RetryPolicy) -> Result<Self, OutboxError> {
        policy.validate()?;
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| OutboxError::OpenFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut outbox = Self {
            writer: BufWriter::new(Self::open_append(&path)?),
            path,
            last_hash: None,
            policy,
            pending: Vec::new(),
            dead: Vec::new(),
            processed: HashSet::new(),
        };
        outbox.replay()?;
        Ok(outbox)
    }

    fn open_append(path: &Path) -> Result<File, OutboxError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| OutboxError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn replay(&mut self) -> Result<(), OutboxError> {
        let file = File::open(&self.path).map_err(|source| OutboxError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: OutboxEntry = serde_json::from_str(&line)?;
            self.apply(entry.record, entry.recorded_at);
            self.last_hash = Some(hasher::hash_line(&line));
        }
        tracing::debug!(
            path = %self.path.display(),
            pending = self.pending.len(),
            dead = self.dead.len(),
            "outbox replayed"
        );
        Ok(())
    }

    fn apply(&mut self, record: OutboxRecord, at: DateTime<Utc>) {
        match record {
            OutboxRecord::Enqueued { event } => self.pending.push(*event),
            OutboxRecord::Attempted {
                event_id,
                error,
                retry_count,
                next_retry_at,
            } => {
                if let Some(event) = self.pending.iter_mut().find(|e| e.event_id == event_id) {
                    event.retry_count = retry_count;
                    event.last_error = Some(error);
                    event.next_retry_at = Some(next_retry_at);
                }
            }
            OutboxRecord::Processed { event_id } => {
                self.pending.retain(|e| e.event_id != event_id);
                self.processed.insert(event_id);
            }
            OutboxRecord::DeadLettered {
                event_id,
                error,
                retry_count,
            } => {
                if let Some(pos) = self.pending.iter().position(|e| e.event_id == event_id) {
                    let mut event = self.pending.remove(pos);
                    event.retry_count = retry_count;
                    event.last_error = Some(error.clone());
                    event.next_retry_at = None;
                    self.dead.push(DeadLetter {
                        event,
                        error,
                        dead_at: at,
                    });
                }
            }
        }
    }

    /// Write one entry, chaining it to the previous line, then apply it.
    fn append(&mut self, record: OutboxRecord, now: DateTime<Utc>) -> Result<(), OutboxError> {
        let mut entry = OutboxEntry::new(record, now);
        entry.previous_hash = self.last_hash.clone();
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.last_hash = Some(hasher::hash_line(&json));
        self.apply(entry.record, now);
        Ok(())
    }

    fn is_known(&self, event_id: Uuid) -> bool {
        self.processed.contains(&event_id)
            || self.pending.iter().any(|e| e.event_id == event_id)
            || self.dead.iter().any(|d| d.event.event_id == event_id)
    }

    /// Queue an event for delivery. Re-enqueuing a known event is a no-op.
    pub fn enqueue(&mut self, event: WorkEvent) -> Result<(), OutboxError> {
        if self.is_known(event.event_id) {
            tracing::debug!(event_id = %event.event_id, "event already in outbox");
            return Ok(());
        }
        tracing::debug!(event_id = %event.event_id, event = %event.event_name, "event enqueued");
        let now = Utc::now();
        self.append(
            OutboxRecord::Enqueued {
                event: Box::new(event),
            },
            now,
        )
    }

    /// Pending events whose next attempt time has arrived, oldest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<WorkEvent> {
        self.pending
            .iter()
            .filter(|e| e.next_retry_at.is_none_or(|at| at <= now))
            .cloned()
            .collect()
    }

    /// Earliest scheduled retry among pending events.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().filter_map(|e| e.next_retry_at).min()
    }

    pub fn mark_processed(&mut self, event_id: Uuid, now: DateTime<Utc>) -> Result<(), OutboxError> {
        if !self.pending.iter().any(|e| e.event_id == event_id) {
            return Err(OutboxError::UnknownEvent(event_id));
        }
        self.append(OutboxRecord::Processed { event_id }, now)?;
        tracing::info!(%event_id, "outbox event processed");
        Ok(())
    }

    /// Record a failed delivery: reschedule with backoff, or dead-letter
    /// once the retry budget is spent.
    pub fn record_failure(
        &mut self,
        event_id: Uuid,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, OutboxError> {
        let event = self
            .pending
            .iter()
            .find(|e| e.event_id == event_id)
            .ok_or(OutboxError::UnknownEvent(event_id))?;
        let retry_count = event.retry_count + 1;
        let error = error.into();

        if self.policy.is_exhausted(retry_count) {
            tracing::warn!(%event_id, retry_count, %error, "outbox event dead-lettered");
            self.append(
                OutboxRecord::DeadLettered {
                    event_id,
                    error,
                    retry_count,
                },
                now,
            )?;
            return Ok(FailureOutcome::DeadLettered);
        }

        let next_retry_at = now + self.policy.delay_for(retry_count);
        tracing::info!(%event_id, retry_count, %next_retry_at, %error, "outbox delivery failed; retry scheduled");
        self.append(
            OutboxRecord::Attempted {
                event_id,
                error,
                retry_count,
                next_retry_at,
            },
            now,
        )?;
        Ok(FailureOutcome::Retry { next_retry_at })
    }

    pub fn pending(&self) -> &[WorkEvent] {
        &self.pending
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry, oldest first.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<OutboxEntry>, OutboxError> {
        let file = File::open(path.as_ref()).map_err(|source| OutboxError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Check every `previous_hash` link. Returns the number of entries.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, OutboxError> {
        let file = File::open(path.as_ref()).map_err(|source| OutboxError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let mut previous: Option<String> = None;
        let mut count = 0;

        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: OutboxEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != previous {
                return Err(OutboxError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line; re-serializing could reorder fields.
            previous = Some(hasher::hash_line(&line));
            count += 1;
        }
        Ok(count)
    }
}
