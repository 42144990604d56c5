// concurrency.rs — Command serialization, stale reads and panel supersession
// against a local store, with a wrapper that slows selected calls down.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

use ws_client::{
    ClientError, CommandLayer, DripAck, LocalApi, PanelFeed, WorkstreamApi, WorkstreamConfig,
    WorkstreamPaths,
};
use ws_pipeline::{
    Candidate, CandidateStatus, ChecklistItem, ChecklistUpdate, ContactInfo, EntityKind,
    ListQuery, NewCandidate, Page, PipelineError, PromotionRequest, Pursuit, PursuitStage, Signal,
    SignalSource, ValueBand,
};
use ws_today::{KindFilter, PanelFilter, PanelView, TierFilter, WorkstreamStats};

/// Delegates to `LocalApi`, sleeping in status updates and panel fetches and
/// tracking how many status updates are in flight per entity.
struct Slow {
    inner: LocalApi,
    update_delay: Duration,
    panel_delays: Mutex<VecDeque<Duration>>,
    in_flight: Mutex<HashMap<Uuid, usize>>,
    max_same_entity: AtomicUsize,
    max_total: AtomicUsize,
    total: AtomicUsize,
}

impl Slow {
    fn new(inner: LocalApi) -> Self {
        Self {
            inner,
            update_delay: Duration::from_millis(40),
            panel_delays: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_same_entity: AtomicUsize::new(0),
            max_total: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    fn enter(&self, id: Uuid) {
        let mut map = self.in_flight.lock().unwrap();
        let n = map.entry(id).or_default();
        *n += 1;
        self.max_same_entity.fetch_max(*n, Ordering::SeqCst);
        let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_total.fetch_max(total, Ordering::SeqCst);
    }

    fn leave(&self, id: Uuid) {
        let mut map = self.in_flight.lock().unwrap();
        if let Some(n) = map.get_mut(&id) {
            *n -= 1;
        }
        self.total.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkstreamApi for Slow {
    async fn list_signals(&self, query: &ListQuery) -> Result<Page<Signal>, ClientError> {
        self.inner.list_signals(query).await
    }
    async fn list_candidates(&self, query: &ListQuery) -> Result<Page<Candidate>, ClientError> {
        self.inner.list_candidates(query).await
    }
    async fn list_pursuits(&self, query: &ListQuery) -> Result<Page<Pursuit>, ClientError> {
        self.inner.list_pursuits(query).await
    }
    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, ClientError> {
        self.inner.get_candidate(id).await
    }
    async fn get_pursuit(&self, id: Uuid) -> Result<Pursuit, ClientError> {
        self.inner.get_pursuit(id).await
    }
    async fn create_candidate_from_signal(
        &self,
        signal_id: Uuid,
        input: NewCandidate,
    ) -> Result<Candidate, ClientError> {
        self.inner.create_candidate_from_signal(signal_id, input).await
    }
    async fn update_candidate_status(
        &self,
        id: Uuid,
        to: CandidateStatus,
        note: Option<String>,
    ) -> Result<Candidate, ClientError> {
        self.enter(id);
        tokio::time::sleep(self.update_delay).await;
        let result = self.inner.update_candidate_status(id, to, note).await;
        self.leave(id);
        result
    }
    async fn promote_candidate(
        &self,
        id: Uuid,
        request: PromotionRequest,
    ) -> Result<Pursuit, ClientError> {
        self.inner.promote_candidate(id, request).await
    }
    async fn update_pursuit_stage(
        &self,
        id: Uuid,
        to: PursuitStage,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.inner.update_pursuit_stage(id, to, note).await
    }
    async fn submit_pursuit(
        &self,
        id: Uuid,
        forecast_value: Option<f64>,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.inner.submit_pursuit(id, forecast_value, note).await
    }
    async fn mark_won(
        &self,
        id: Uuid,
        value: Option<f64>,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.inner.mark_won(id, value, notes).await
    }
    async fn mark_lost(
        &self,
        id: Uuid,
        reason: String,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.inner.mark_lost(id, reason, notes).await
    }
    async fn get_checklist(&self, pursuit_id: Uuid) -> Result<Vec<ChecklistItem>, ClientError> {
        self.inner.get_checklist(pursuit_id).await
    }
    async fn update_checklist(
        &self,
        pursuit_id: Uuid,
        updates: Vec<ChecklistUpdate>,
    ) -> Result<Vec<ChecklistItem>, ClientError> {
        self.inner.update_checklist(pursuit_id, updates).await
    }
    async fn trigger_drip(&self, candidate_id: Uuid) -> Result<DripAck, ClientError> {
        self.inner.trigger_drip(candidate_id).await
    }
    async fn today_panel(&self, filter: PanelFilter) -> Result<PanelView, ClientError> {
        let delay = self.panel_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.today_panel(filter).await
    }
    async fn stats(&self, tier: Option<TierFilter>) -> Result<WorkstreamStats, ClientError> {
        self.inner.stats(tier).await
    }
}

fn local(dir: &TempDir) -> LocalApi {
    LocalApi::open(
        &WorkstreamPaths::for_project(dir.path()),
        &WorkstreamConfig::default(),
    )
    .unwrap()
}

fn candidate(api: &LocalApi, title: &str) -> Uuid {
    api.with_pipeline(|p| {
        let c = p.create_candidate(
            "default",
            NewCandidate {
                title: title.to_string(),
                value_band: ValueBand::Medium,
                contact: ContactInfo::default(),
                confidence: 60,
            },
        )?;
        p.transition_candidate(c.candidate_id, CandidateStatus::Triaged, None)
    })
    .unwrap()
    .candidate_id
}

#[tokio::test]
async fn same_entity_commands_run_one_at_a_time_in_order() {
    let dir = tempdir().unwrap();
    let inner = local(&dir);
    let id = candidate(&inner, "Acme");
    let api = Arc::new(Slow::new(inner));
    let layer = CommandLayer::new(api.clone());

    let (first, second) = tokio::join!(
        layer.update_candidate_status(id, CandidateStatus::Nurture, None),
        layer.update_candidate_status(id, CandidateStatus::OnHold, None),
    );
    assert_eq!(first.unwrap().status, CandidateStatus::Nurture);
    assert_eq!(second.unwrap().status, CandidateStatus::OnHold);
    assert_eq!(api.max_same_entity.load(Ordering::SeqCst), 1);
    assert_eq!(
        layer.cached_candidate(id).unwrap().status,
        CandidateStatus::OnHold
    );
    assert_eq!(layer.active_locks(), 0);
}

#[tokio::test]
async fn different_entities_proceed_concurrently() {
    let dir = tempdir().unwrap();
    let inner = local(&dir);
    let a = candidate(&inner, "Acme");
    let b = candidate(&inner, "Globex");
    let api = Arc::new(Slow::new(inner));
    let layer = CommandLayer::new(api.clone());

    let (ra, rb) = tokio::join!(
        layer.update_candidate_status(a, CandidateStatus::Nurture, None),
        layer.update_candidate_status(b, CandidateStatus::OnHold, None),
    );
    ra.unwrap();
    rb.unwrap();
    assert_eq!(api.max_total.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_cache_is_refreshed_and_reported() {
    let dir = tempdir().unwrap();
    let api = Arc::new(local(&dir));
    let id = candidate(&api, "Initech");
    let layer = CommandLayer::new(api.clone());
    layer.remember_candidate(&api.get_candidate(id).await.unwrap());

    // Someone else archives the candidate behind the layer's back.
    api.with_pipeline(|p| p.transition_candidate(id, CandidateStatus::Archived, None))
        .unwrap();

    let err = layer
        .update_candidate_status(id, CandidateStatus::Nurture, None)
        .await
        .unwrap_err();
    match err {
        ClientError::StaleRead {
            entity,
            cached,
            current,
            ..
        } => {
            assert_eq!(entity, EntityKind::Candidate);
            assert_eq!(cached, "triaged");
            assert_eq!(current, "archived");
        }
        other => panic!("expected StaleRead, got {other:?}"),
    }
    assert_eq!(
        layer.cached_candidate(id).unwrap().status,
        CandidateStatus::Archived
    );

    // The refreshed cache now rejects locally.
    let err = layer
        .update_candidate_status(id, CandidateStatus::Nurture, None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_transition());
}

fn untriaged_candidate(api: &LocalApi, title: &str) -> Uuid {
    api.with_pipeline(|p| {
        p.create_candidate(
            "default",
            NewCandidate {
                title: title.to_string(),
                value_band: ValueBand::Small,
                contact: ContactInfo::default(),
                confidence: 30,
            },
        )
    })
    .unwrap()
    .candidate_id
}

#[tokio::test]
async fn local_rejection_refetches_and_proceeds_when_now_legal() {
    let dir = tempdir().unwrap();
    let api = Arc::new(local(&dir));
    let id = untriaged_candidate(&api, "Hooli");
    let layer = CommandLayer::new(api.clone());
    layer.remember_candidate(&api.get_candidate(id).await.unwrap());

    // Triaged elsewhere; the cached copy still says `new`.
    api.with_pipeline(|p| p.transition_candidate(id, CandidateStatus::Triaged, None))
        .unwrap();

    let updated = layer
        .update_candidate_status(id, CandidateStatus::Nurture, None)
        .await
        .unwrap();
    assert_eq!(updated.status, CandidateStatus::Nurture);
    assert_eq!(
        layer.cached_candidate(id).unwrap().status,
        CandidateStatus::Nurture
    );
}

#[tokio::test]
async fn local_rejection_with_moved_entity_reports_stale_read() {
    let dir = tempdir().unwrap();
    let api = Arc::new(local(&dir));
    let id = untriaged_candidate(&api, "Pied Piper");
    let layer = CommandLayer::new(api.clone());
    layer.remember_candidate(&api.get_candidate(id).await.unwrap());

    api.with_pipeline(|p| p.transition_candidate(id, CandidateStatus::Archived, None))
        .unwrap();

    let err = layer
        .update_candidate_status(id, CandidateStatus::Nurture, None)
        .await
        .unwrap_err();
    match err {
        ClientError::StaleRead { cached, current, .. } => {
            assert_eq!(cached, "new");
            assert_eq!(current, "archived");
        }
        other => panic!("expected StaleRead, got {other:?}"),
    }
    assert_eq!(
        layer.cached_candidate(id).unwrap().status,
        CandidateStatus::Archived
    );
}

#[tokio::test]
async fn gate_failure_passes_through_unchanged() {
    let dir = tempdir().unwrap();
    let api = Arc::new(local(&dir));
    let id = candidate(&api, "Umbrella");
    let layer = CommandLayer::new(api.clone());

    let pursuit = layer
        .promote_candidate(
            id,
            PromotionRequest {
                title: "Umbrella rollout".into(),
                forecast_value: 120_000.0,
                due_date: Utc::now() + chrono::Duration::days(30),
                win_probability: Some(40),
                checklist_required: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        layer.cached_candidate(id).unwrap().status,
        CandidateStatus::Promoted
    );

    api.with_pipeline(|p| {
        p.add_checklist_item(pursuit.pursuit_id, "capture plan", PursuitStage::Pink)
    })
    .unwrap();

    let err = layer
        .advance_pursuit(pursuit.pursuit_id, PursuitStage::Pink, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Pipeline(PipelineError::ChecklistIncomplete { .. })
    ));
    assert_eq!(
        layer.cached_pursuit(pursuit.pursuit_id).unwrap().stage,
        PursuitStage::Qual
    );
}

#[tokio::test]
async fn older_panel_response_is_discarded() {
    let dir = tempdir().unwrap();
    let inner = local(&dir);
    inner
        .with_pipeline(|p| p.ingest_signal(Signal::new("default", SignalSource::Web, "hi", 0.5)))
        .unwrap();
    let api = Arc::new(Slow::new(inner));
    api.panel_delays
        .lock()
        .unwrap()
        .extend([Duration::from_millis(60), Duration::ZERO]);
    let feed = PanelFeed::new(api.clone());
    let filter = PanelFilter::new(KindFilter::All, None);

    let (old, new) = tokio::join!(feed.refresh(filter), feed.refresh(filter));
    assert!(matches!(
        old,
        Err(ClientError::Superseded { generation: 1, .. })
    ));
    let new = new.unwrap();
    assert!(Arc::ptr_eq(&feed.current(&filter).unwrap(), &new));
    assert_eq!(new.items.len(), 1);
}
