// api.rs — The collaborator contract and the drip provider seam.
//
// `WorkstreamApi` is everything the pipeline needs from its backing service.
// The local implementation lives in `local.rs`; a remote one would wrap an
// HTTP client behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::{
    Candidate, CandidateStatus, ChecklistItem, ChecklistUpdate, ListQuery, NewCandidate, Page,
    PromotionRequest, Pursuit, PursuitStage, Signal,
};
use ws_today::{PanelFilter, PanelView, TierFilter, WorkstreamStats};

use crate::error::ClientError;

/// Acknowledgement of a drip trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DripAck {
    pub candidate_id: Uuid,
    /// Schedule rows created.
    pub scheduled: usize,
    /// Whether a dispatch request was queued for the provider.
    pub queued: bool,
}

#[async_trait]
pub trait WorkstreamApi: Send + Sync {
    async fn list_signals(&self, query: &ListQuery) -> Result<Page<Signal>, ClientError>;
    async fn list_candidates(&self, query: &ListQuery) -> Result<Page<Candidate>, ClientError>;
    async fn list_pursuits(&self, query: &ListQuery) -> Result<Page<Pursuit>, ClientError>;

    async fn get_candidate(&self, id: Uuid) -> Result<Candidate, ClientError>;
    async fn get_pursuit(&self, id: Uuid) -> Result<Pursuit, ClientError>;

    async fn create_candidate_from_signal(
        &self,
        signal_id: Uuid,
        input: NewCandidate,
    ) -> Result<Candidate, ClientError>;

    async fn update_candidate_status(
        &self,
        id: Uuid,
        to: CandidateStatus,
        note: Option<String>,
    ) -> Result<Candidate, ClientError>;

    async fn promote_candidate(
        &self,
        id: Uuid,
        request: PromotionRequest,
    ) -> Result<Pursuit, ClientError>;

    async fn update_pursuit_stage(
        &self,
        id: Uuid,
        to: PursuitStage,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError>;

    async fn submit_pursuit(
        &self,
        id: Uuid,
        forecast_value: Option<f64>,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError>;

    async fn mark_won(
        &self,
        id: Uuid,
        value: Option<f64>,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError>;

    async fn mark_lost(
        &self,
        id: Uuid,
        reason: String,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError>;

    async fn get_checklist(&self, pursuit_id: Uuid) -> Result<Vec<ChecklistItem>, ClientError>;

    async fn update_checklist(
        &self,
        pursuit_id: Uuid,
        updates: Vec<ChecklistUpdate>,
    ) -> Result<Vec<ChecklistItem>, ClientError>;

    async fn trigger_drip(&self, candidate_id: Uuid) -> Result<DripAck, ClientError>;

    async fn today_panel(&self, filter: PanelFilter) -> Result<PanelView, ClientError>;

    /// Headline numbers; `tier` scopes the ready-to-promote count.
    async fn stats(&self, tier: Option<TierFilter>) -> Result<WorkstreamStats, ClientError>;
}

/// The external drip-campaign dispatcher: takes a candidate id, reports
/// success or failure. Failures are retried by the outbox worker.
#[async_trait]
pub trait DripProvider: Send + Sync {
    async fn dispatch(&self, candidate_id: Uuid) -> Result<(), ClientError>;
}

/// Provider that only records the dispatch in the log.
#[derive(Debug, Default, Clone)]
pub struct LogDripProvider;

#[async_trait]
impl DripProvider for LogDripProvider {
    async fn dispatch(&self, candidate_id: Uuid) -> Result<(), ClientError> {
        tracing::info!(%candidate_id, "drip dispatched");
        Ok(())
    }
}
