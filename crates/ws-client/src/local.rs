// local.rs — `WorkstreamApi` backed by the on-disk pipeline store.
//
// Every call locks the pipeline for its whole (synchronous) body, so two
// writers in one process never interleave. The outbox is shared with the
// pipeline's `OutboxSink` and the delivery worker. The panel, stats, SLA
// sweep and breach listing only see records of the configured org.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ws_outbox::{Outbox, OutboxSink};
use ws_pipeline::{
    Candidate, CandidateStatus, ChecklistItem, ChecklistUpdate, DripStep, ListQuery, LogSink,
    NewCandidate, Page, Pipeline, PipelineError, PromotionRequest, Pursuit, PursuitStage, Signal,
    WorkEvent, WorkEventPayload,
};
use ws_sla::{BreachLedger, SlaBreach, SlaEvaluator, SlaSubject, SweepReport};
use ws_today::{
    build_panel, KindFilter, PanelFilter, PanelView, PriorityConfig, Projector, TierFilter,
    WorkstreamStats,
};

use crate::api::{DripAck, WorkstreamApi};
use crate::config::{WorkstreamConfig, WorkstreamPaths};
use crate::error::ClientError;

pub struct LocalApi {
    pipeline: Mutex<Pipeline>,
    ledger: Mutex<BreachLedger>,
    outbox: Arc<Mutex<Outbox>>,
    evaluator: SlaEvaluator,
    priority: PriorityConfig,
    drip_sequence: Vec<DripStep>,
    org_id: String,
}

type Snapshot = (Vec<Signal>, Vec<Candidate>, Vec<Pursuit>);

fn poisoned(what: &str) -> ClientError {
    ClientError::Transient(format!("{} lock poisoned", what))
}

impl LocalApi {
    /// Open the store, event log, outbox and breach ledger for a project.
    pub fn open(paths: &WorkstreamPaths, config: &WorkstreamConfig) -> Result<Self, ClientError> {
        let mut pipeline = Pipeline::open(&paths.store_dir)?;
        let outbox = Arc::new(Mutex::new(Outbox::open(
            &paths.outbox_log,
            config.outbox.clone(),
        )?));
        pipeline
            .dispatcher_mut()
            .add_sink(Box::new(LogSink::new(&paths.events_log)));
        pipeline
            .dispatcher_mut()
            .add_sink(Box::new(OutboxSink::new(outbox.clone())));
        let ledger = BreachLedger::open(&paths.breaches_file)?;

        tracing::debug!(root = %paths.project_root.display(), "local workstream opened");
        Ok(Self {
            pipeline: Mutex::new(pipeline),
            ledger: Mutex::new(ledger),
            outbox,
            evaluator: config.evaluator()?,
            priority: config.priority.clone(),
            drip_sequence: config.drip.sequence.clone(),
            org_id: config.org_id.clone(),
        })
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn evaluator(&self) -> &SlaEvaluator {
        &self.evaluator
    }

    /// The outbox the pipeline feeds; shared with the delivery worker.
    pub fn outbox(&self) -> Arc<Mutex<Outbox>> {
        self.outbox.clone()
    }

    fn lock_pipeline(&self) -> Result<MutexGuard<'_, Pipeline>, ClientError> {
        self.pipeline.lock().map_err(|_| poisoned("pipeline"))
    }

    /// Run a pipeline operation that has no collaborator method (ingest,
    /// enrichment, ICP, proposals, checklist authoring).
    pub fn with_pipeline<T>(
        &self,
        f: impl FnOnce(&Pipeline) -> Result<T, PipelineError>,
    ) -> Result<T, ClientError> {
        let pipeline = self.lock_pipeline()?;
        Ok(f(&pipeline)?)
    }

    /// Evaluate every record against the SLA rules, update the breach ledger
    /// and emit `sla_breached` for each new breach.
    pub fn sweep_sla(&self, now: DateTime<Utc>) -> Result<SweepReport, ClientError> {
        let pipeline = self.lock_pipeline()?;
        let (signals, candidates, pursuits) = self.org_records(&pipeline)?;
        let subjects: Vec<SlaSubject> = signals
            .iter()
            .map(SlaSubject::from)
            .chain(candidates.iter().map(SlaSubject::from))
            .chain(pursuits.iter().map(SlaSubject::from))
            .collect();

        let mut ledger = self.ledger.lock().map_err(|_| poisoned("breach ledger"))?;
        let report = ledger.sweep(&subjects, &self.evaluator, now);
        if !report.is_empty() {
            ledger.save()?;
        }

        for breach in &report.created {
            pipeline.dispatcher().dispatch(&WorkEvent::new(
                &breach.org_id,
                breach.entity_type,
                breach.entity_id,
                WorkEventPayload::SlaBreached {
                    rule_name: breach.rule_name.clone(),
                    hours_over: breach.hours_over,
                },
            ));
        }
        tracing::info!(
            subjects = subjects.len(),
            created = report.created.len(),
            resolved = report.resolved.len(),
            "SLA sweep complete"
        );
        Ok(report)
    }

    /// Open breaches, newest first.
    pub fn open_breaches(&self) -> Result<Vec<SlaBreach>, ClientError> {
        let ledger = self.ledger.lock().map_err(|_| poisoned("breach ledger"))?;
        let mut open: Vec<_> = ledger
            .open_breaches()
            .filter(|b| b.org_id == self.org_id)
            .cloned()
            .collect();
        open.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(open)
    }

    fn org_records(&self, pipeline: &Pipeline) -> Result<Snapshot, ClientError> {
        let store = pipeline.store();
        let org = self.org_id.as_str();
        let mut signals = store.signals.list()?;
        signals.retain(|s| s.org_id == org);
        let mut candidates = store.candidates.list()?;
        candidates.retain(|c| c.org_id == org);
        let mut pursuits = store.pursuits.list()?;
        pursuits.retain(|p| p.org_id == org);
        Ok((signals, candidates, pursuits))
    }

    fn snapshot(&self) -> Result<Snapshot, ClientError> {
        let pipeline = self.lock_pipeline()?;
        self.org_records(&pipeline)
    }

    fn panel_now(&self, filter: &PanelFilter) -> Result<PanelView, ClientError> {
        let (signals, candidates, pursuits) = self.snapshot()?;
        let items = Projector::new(&self.evaluator, Utc::now()).all(&signals, &candidates, &pursuits);
        Ok(build_panel(items, filter, &self.priority))
    }
}

#[async_trait]
impl WorkstreamApi for LocalApi {
    async fn list_signals(&self, query: &ListQuery) -> Result<Page<Signal>, ClientError> {
        self.with_pipeline(|p| p.store().signals.query(query))
    }

    async fn list_candidates(&self, query: &ListQuery) -> Result<Page<Candidate>, ClientError> {
        self.with_pipeline(|p| p.store().candidates.query(query))
    }

    async fn list_pursuits(&self, query: &ListQuery) -> Result<Page<Pursuit>, ClientError> {
        self.with_pipeline(|p| p.store().pursuits.query(query))
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, ClientError> {
        self.with_pipeline(|p| p.store().candidates.require(id))
    }

    async fn get_pursuit(&self, id: Uuid) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.store().pursuits.require(id))
    }

    async fn create_candidate_from_signal(
        &self,
        signal_id: Uuid,
        input: NewCandidate,
    ) -> Result<Candidate, ClientError> {
        self.with_pipeline(|p| p.create_candidate_from_signal(signal_id, input))
    }

    async fn update_candidate_status(
        &self,
        id: Uuid,
        to: CandidateStatus,
        note: Option<String>,
    ) -> Result<Candidate, ClientError> {
        self.with_pipeline(|p| p.transition_candidate(id, to, note))
    }

    async fn promote_candidate(
        &self,
        id: Uuid,
        request: PromotionRequest,
    ) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.promote_candidate(id, request))
            .map(|(_, pursuit)| pursuit)
    }

    async fn update_pursuit_stage(
        &self,
        id: Uuid,
        to: PursuitStage,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.advance_pursuit(id, to, note))
    }

    async fn submit_pursuit(
        &self,
        id: Uuid,
        forecast_value: Option<f64>,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.submit_pursuit(id, forecast_value, note))
    }

    async fn mark_won(
        &self,
        id: Uuid,
        value: Option<f64>,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.mark_won(id, value, notes))
    }

    async fn mark_lost(
        &self,
        id: Uuid,
        reason: String,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.with_pipeline(|p| p.mark_lost(id, reason, notes))
    }

    async fn get_checklist(&self, pursuit_id: Uuid) -> Result<Vec<ChecklistItem>, ClientError> {
        self.with_pipeline(|p| p.checklist(pursuit_id))
    }

    async fn update_checklist(
        &self,
        pursuit_id: Uuid,
        updates: Vec<ChecklistUpdate>,
    ) -> Result<Vec<ChecklistItem>, ClientError> {
        self.with_pipeline(|p| p.update_checklist(pursuit_id, &updates))
    }

    async fn trigger_drip(&self, candidate_id: Uuid) -> Result<DripAck, ClientError> {
        let rows = self.with_pipeline(|p| {
            p.schedule_drip(candidate_id, Utc::now(), &self.drip_sequence)
        })?;
        let outbox = self.outbox.lock().map_err(|_| poisoned("outbox"))?;
        let queued = outbox.pending().iter().any(|e| {
            matches!(e.payload, WorkEventPayload::DripRequested { candidate_id: c } if c == candidate_id)
        });
        Ok(DripAck {
            candidate_id,
            scheduled: rows.len(),
            queued,
        })
    }

    async fn today_panel(&self, filter: PanelFilter) -> Result<PanelView, ClientError> {
        self.panel_now(&filter)
    }

    async fn stats(&self, tier: Option<TierFilter>) -> Result<WorkstreamStats, ClientError> {
        let (signals, candidates, pursuits) = self.snapshot()?;
        let ready = {
            let items =
                Projector::new(&self.evaluator, Utc::now()).all(&signals, &candidates, &pursuits);
            build_panel(items, &PanelFilter::new(KindFilter::All, tier), &self.priority)
                .ready_count
        };
        let open_breaches = self
            .ledger
            .lock()
            .map_err(|_| poisoned("breach ledger"))?
            .open_breaches()
            .filter(|b| b.org_id == self.org_id)
            .count();
        Ok(WorkstreamStats::compute(
            &signals,
            &candidates,
            &pursuits,
            open_breaches,
            ready,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;
    use ws_pipeline::{ContactInfo, SignalSource, ValueBand};
    use ws_today::KindFilter;

    fn open(dir: &std::path::Path) -> LocalApi {
        let paths = WorkstreamPaths::for_project(dir);
        LocalApi::open(&paths, &WorkstreamConfig::default()).unwrap()
    }

    fn new_candidate(title: &str) -> NewCandidate {
        NewCandidate {
            title: title.to_string(),
            value_band: ValueBand::Large,
            contact: ContactInfo::default(),
            confidence: 70,
        }
    }

    #[tokio::test]
    async fn drip_trigger_queues_outbox_delivery() {
        let dir = tempdir().unwrap();
        let api = open(dir.path());
        let candidate = api
            .with_pipeline(|p| p.create_candidate("default", new_candidate("Acme")))
            .unwrap();
        api.update_candidate_status(candidate.candidate_id, CandidateStatus::Triaged, None)
            .await
            .unwrap();

        let ack = api.trigger_drip(candidate.candidate_id).await.unwrap();
        assert_eq!(ack.scheduled, 3);
        assert!(ack.queued);

        let refreshed = api.get_candidate(candidate.candidate_id).await.unwrap();
        assert_eq!(refreshed.status, CandidateStatus::Nurture);
        assert_eq!(api.outbox().lock().unwrap().pending().len(), 1);
    }

    #[tokio::test]
    async fn sweep_records_breach_and_stats_count_it() {
        let dir = tempdir().unwrap();
        let api = open(dir.path());
        let signal = api
            .with_pipeline(|p| {
                p.ingest_signal(Signal::new("default", SignalSource::Email, "rfp", 0.4))
            })
            .unwrap();

        let report = api
            .sweep_sla(signal.created_at + Duration::hours(48))
            .unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(api.open_breaches().unwrap().len(), 1);

        // Sweeping again in the same window records nothing new.
        let again = api
            .sweep_sla(signal.created_at + Duration::hours(49))
            .unwrap();
        assert!(again.created.is_empty());

        let stats = api.stats(None).await.unwrap();
        assert_eq!(stats.open_breaches, 1);
        assert_eq!(stats.signals.get("new"), Some(&1));

        let log = std::fs::read_to_string(WorkstreamPaths::for_project(dir.path()).events_log)
            .unwrap();
        assert_eq!(log.matches("\"event_name\":\"sla_breached\"").count(), 1);
    }

    #[tokio::test]
    async fn panel_reflects_store() {
        let dir = tempdir().unwrap();
        let api = open(dir.path());
        api.with_pipeline(|p| {
            p.ingest_signal(Signal::new("default", SignalSource::Web, "demo", 0.9))?;
            p.create_candidate("default", new_candidate("Globex"))
        })
        .unwrap();

        let all = api.today_panel(PanelFilter::default()).await.unwrap();
        assert_eq!(all.items.len(), 2);

        let only_candidates = api
            .today_panel(PanelFilter::new(KindFilter::Candidate, None))
            .await
            .unwrap();
        assert_eq!(only_candidates.items.len(), 1);
        assert_eq!(only_candidates.items[0].title, "Globex");
    }

    #[tokio::test]
    async fn panel_stats_and_sweep_ignore_other_orgs() {
        let dir = tempdir().unwrap();
        let api = open(dir.path());
        let foreign = api
            .with_pipeline(|p| {
                let foreign = p.ingest_signal(Signal::new("other-org", SignalSource::Web, "x", 0.9))?;
                p.ingest_signal(Signal::new("default", SignalSource::Web, "ours", 0.5))?;
                p.create_candidate("other-org", new_candidate("Elsewhere"))?;
                Ok(foreign)
            })
            .unwrap();

        let panel = api.today_panel(PanelFilter::default()).await.unwrap();
        assert_eq!(panel.items.len(), 1);
        assert!(panel.items.iter().all(|i| i.org_id == "default"));

        let stats = api.stats(None).await.unwrap();
        assert_eq!(stats.signals.values().sum::<usize>(), 1);
        assert!(stats.candidates.is_empty());

        let report = api
            .sweep_sla(foreign.created_at + Duration::hours(48))
            .unwrap();
        assert_eq!(report.created.len(), 1);
        assert!(report.created.iter().all(|b| b.org_id == "default"));
        assert_eq!(api.open_breaches().unwrap().len(), 1);
        assert_eq!(api.stats(None).await.unwrap().open_breaches, 1);
    }

    #[tokio::test]
    async fn stats_ready_count_follows_tier_filter() {
        let dir = tempdir().unwrap();
        let api = open(dir.path());
        api.with_pipeline(|p| {
            let c = p.create_candidate(
                "default",
                NewCandidate {
                    confidence: 95,
                    ..new_candidate("Acme")
                },
            )?;
            p.set_icp(
                c.candidate_id,
                ws_pipeline::IcpSummary {
                    score: 90.0,
                    band: ws_pipeline::IcpBand::High,
                },
            )
        })
        .unwrap();

        assert_eq!(api.stats(None).await.unwrap().ready_to_promote, 1);
        let high: TierFilter = "high".parse().unwrap();
        assert_eq!(api.stats(Some(high)).await.unwrap().ready_to_promote, 1);
        let critical: TierFilter = "critical".parse().unwrap();
        assert_eq!(api.stats(Some(critical)).await.unwrap().ready_to_promote, 0);
    }
}
