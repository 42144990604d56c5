// worker.rs — Delivers queued side effects from the outbox.
//
// The outbox lock is never held across a provider call: due events are
// copied out, dispatched, and each result is written back under a fresh
// lock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use ws_outbox::{FailureOutcome, Outbox};
use ws_pipeline::{WorkEvent, WorkEventPayload};

use crate::api::DripProvider;
use crate::error::ClientError;

/// What one pass over the outbox did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead: usize,
}

pub struct OutboxWorker<P> {
    outbox: Arc<Mutex<Outbox>>,
    provider: Arc<P>,
}

impl<P: DripProvider> OutboxWorker<P> {
    pub fn new(outbox: Arc<Mutex<Outbox>>, provider: Arc<P>) -> Self {
        Self { outbox, provider }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Outbox>, ClientError> {
        self.outbox
            .lock()
            .map_err(|_| ClientError::Transient("outbox lock poisoned".into()))
    }

    async fn deliver(&self, event: &WorkEvent) -> Result<(), ClientError> {
        match &event.payload {
            WorkEventPayload::DripRequested { candidate_id } => {
                self.provider.dispatch(*candidate_id).await
            }
            other => {
                tracing::warn!(
                    event_id = %event.event_id,
                    event = other.event_name(),
                    "no handler for outbox event; marking processed"
                );
                Ok(())
            }
        }
    }

    /// Attempt every event due at `now` once.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<WorkerReport, ClientError> {
        let due = self.lock()?.due(now);
        let mut report = WorkerReport::default();

        for event in due {
            let outcome = self.deliver(&event).await;
            let mut outbox = self.lock()?;
            match outcome {
                Ok(()) => {
                    outbox.mark_processed(event.event_id, now)?;
                    report.delivered += 1;
                }
                Err(e) => match outbox.record_failure(event.event_id, e.to_string(), now)? {
                    FailureOutcome::Retry { .. } => report.retried += 1,
                    FailureOutcome::DeadLettered => report.dead += 1,
                },
            }
        }

        if report != WorkerReport::default() {
            tracing::info!(
                delivered = report.delivered,
                retried = report.retried,
                dead = report.dead,
                "outbox pass complete"
            );
        }
        Ok(report)
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_ms = poll_interval.as_millis() as u64, "outbox worker started");
        loop {
            if let Err(e) = self.run_once(Utc::now()).await {
                tracing::warn!("outbox pass failed: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("outbox worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use uuid::Uuid;
    use ws_outbox::RetryPolicy;
    use ws_pipeline::EntityKind;

    /// Fails the first `failures` dispatches, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DripProvider for Flaky {
        async fn dispatch(&self, _candidate_id: Uuid) -> Result<(), ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ClientError::Transient("provider unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn drip_event() -> WorkEvent {
        let candidate_id = Uuid::new_v4();
        WorkEvent::new(
            "org-1",
            EntityKind::Candidate,
            candidate_id,
            WorkEventPayload::DripRequested { candidate_id },
        )
    }

    fn outbox(dir: &std::path::Path, max_attempts: u32) -> Arc<Mutex<Outbox>> {
        let policy = RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        };
        Arc::new(Mutex::new(
            Outbox::open(dir.join("outbox.jsonl"), policy).unwrap(),
        ))
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_after_backoff() {
        let dir = tempdir().unwrap();
        let outbox = outbox(dir.path(), 5);
        outbox.lock().unwrap().enqueue(drip_event()).unwrap();
        let provider = Arc::new(Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let worker = OutboxWorker::new(outbox.clone(), provider.clone());

        let now = Utc::now();
        let first = worker.run_once(now).await.unwrap();
        assert_eq!(first.retried, 1);

        // Not due yet.
        let idle = worker.run_once(now + ChronoDuration::seconds(5)).await.unwrap();
        assert_eq!(idle, WorkerReport::default());

        let second = worker.run_once(now + ChronoDuration::seconds(31)).await.unwrap();
        assert_eq!(second.delivered, 1);
        assert!(outbox.lock().unwrap().pending().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_event_is_dead_lettered() {
        let dir = tempdir().unwrap();
        let outbox = outbox(dir.path(), 1);
        outbox.lock().unwrap().enqueue(drip_event()).unwrap();
        let worker = OutboxWorker::new(
            outbox.clone(),
            Arc::new(Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            }),
        );

        let report = worker.run_once(Utc::now()).await.unwrap();
        assert_eq!(report.dead, 1);
        let outbox = outbox.lock().unwrap();
        assert!(outbox.pending().is_empty());
        assert_eq!(outbox.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let worker = OutboxWorker::new(
            outbox(dir.path(), 5),
            Arc::new(Flaky {
                failures: 0,
                calls: AtomicUsize::new(0),
            }),
        );
        let (tx, rx) = watch::channel(false);
        let handle = async move { worker.run(Duration::from_millis(10), rx).await };
        let stopper = async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.send(true).unwrap();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(handle, stopper);
        })
        .await
        .unwrap();
    }
}
