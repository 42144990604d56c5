// command.rs — Status-changing commands with per-entity serialization.
//
// Commands for the same entity id run one at a time, in arrival order
// (tokio mutexes are fair). Commands for different entities run
// concurrently. Each command is checked against the local transition table
// before the collaborator is called. A local rejection refetches the entity
// once: if the fresh status allows the move the command goes ahead,
// otherwise the cache is replaced and the caller gets `StaleRead`. If the
// collaborator rejects a command the cache thought legal, the entity is
// refetched the same way. Lock entries are dropped once no command holds or
// waits on them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use ws_pipeline::{
    check_transition, Candidate, CandidateStatus, EntityKind, PromotionRequest, Pursuit,
    PursuitStage,
};

use crate::api::WorkstreamApi;
use crate::error::ClientError;

type EntityLock = Arc<tokio::sync::Mutex<()>>;
type LockTable = Mutex<HashMap<Uuid, EntityLock>>;

/// Held for the duration of one command. Dropping it releases the entity
/// and evicts the table entry when nobody else is queued on it.
struct EntityPermit<'a> {
    table: &'a LockTable,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityPermit<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Ok(mut locks) = self.table.lock() {
            if locks.get(&self.id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(&self.id);
            }
        }
    }
}

pub struct CommandLayer<A> {
    api: Arc<A>,
    locks: LockTable,
    candidates: RwLock<HashMap<Uuid, Candidate>>,
    pursuits: RwLock<HashMap<Uuid, Pursuit>>,
}

impl<A: WorkstreamApi> CommandLayer<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            locks: Mutex::new(HashMap::new()),
            candidates: RwLock::new(HashMap::new()),
            pursuits: RwLock::new(HashMap::new()),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    async fn acquire(&self, id: Uuid) -> Result<EntityPermit<'_>, ClientError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| ClientError::Transient("command lock table poisoned".into()))?;
            locks.entry(id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        Ok(EntityPermit {
            table: &self.locks,
            id,
            guard: Some(guard),
        })
    }

    /// Entities with a command running or queued.
    pub fn active_locks(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn cached_candidate(&self, id: Uuid) -> Option<Candidate> {
        self.candidates.read().ok()?.get(&id).cloned()
    }

    pub fn cached_pursuit(&self, id: Uuid) -> Option<Pursuit> {
        self.pursuits.read().ok()?.get(&id).cloned()
    }

    fn store_candidate(&self, candidate: &Candidate) {
        if let Ok(mut cache) = self.candidates.write() {
            cache.insert(candidate.candidate_id, candidate.clone());
        }
    }

    fn store_pursuit(&self, pursuit: &Pursuit) {
        if let Ok(mut cache) = self.pursuits.write() {
            cache.insert(pursuit.pursuit_id, pursuit.clone());
        }
    }

    /// Seed the cache from a listing or another read.
    pub fn remember_candidate(&self, candidate: &Candidate) {
        self.store_candidate(candidate);
    }

    pub fn remember_pursuit(&self, pursuit: &Pursuit) {
        self.store_pursuit(pursuit);
    }

    async fn candidate_view(&self, id: Uuid) -> Result<Candidate, ClientError> {
        if let Some(candidate) = self.cached_candidate(id) {
            return Ok(candidate);
        }
        let candidate = self.api.get_candidate(id).await?;
        self.store_candidate(&candidate);
        Ok(candidate)
    }

    async fn pursuit_view(&self, id: Uuid) -> Result<Pursuit, ClientError> {
        if let Some(pursuit) = self.cached_pursuit(id) {
            return Ok(pursuit);
        }
        let pursuit = self.api.get_pursuit(id).await?;
        self.store_pursuit(&pursuit);
        Ok(pursuit)
    }

    /// Cached candidate that admits `to`. A local rejection refetches once;
    /// a fresher status that allows the move is used, one that does not is
    /// reported as `StaleRead`.
    async fn checked_candidate(
        &self,
        id: Uuid,
        to: CandidateStatus,
    ) -> Result<Candidate, ClientError> {
        let cached = self.candidate_view(id).await?;
        let Err(rejected) = check_transition(id, cached.status, to) else {
            return Ok(cached);
        };
        let current = self.api.get_candidate(id).await?;
        self.store_candidate(&current);
        if current.status == cached.status {
            return Err(rejected.into());
        }
        tracing::info!(
            candidate_id = %id,
            cached = %cached.status,
            current = %current.status,
            "stale candidate refreshed"
        );
        if check_transition(id, current.status, to).is_ok() {
            return Ok(current);
        }
        Err(ClientError::StaleRead {
            entity: EntityKind::Candidate,
            id,
            cached: cached.status.to_string(),
            current: current.status.to_string(),
        })
    }

    async fn checked_pursuit(&self, id: Uuid, to: PursuitStage) -> Result<Pursuit, ClientError> {
        let cached = self.pursuit_view(id).await?;
        let Err(rejected) = check_transition(id, cached.stage, to) else {
            return Ok(cached);
        };
        let current = self.api.get_pursuit(id).await?;
        self.store_pursuit(&current);
        if current.stage == cached.stage {
            return Err(rejected.into());
        }
        tracing::info!(
            pursuit_id = %id,
            cached = %cached.stage,
            current = %current.stage,
            "stale pursuit refreshed"
        );
        if check_transition(id, current.stage, to).is_ok() {
            return Ok(current);
        }
        Err(ClientError::StaleRead {
            entity: EntityKind::Pursuit,
            id,
            cached: cached.stage.to_string(),
            current: current.stage.to_string(),
        })
    }

    /// Replace the cached candidate and describe the mismatch.
    async fn candidate_stale(&self, cached: &Candidate) -> ClientError {
        match self.api.get_candidate(cached.candidate_id).await {
            Ok(current) => {
                self.store_candidate(&current);
                tracing::info!(
                    candidate_id = %cached.candidate_id,
                    cached = %cached.status,
                    current = %current.status,
                    "stale candidate refreshed"
                );
                ClientError::StaleRead {
                    entity: EntityKind::Candidate,
                    id: cached.candidate_id,
                    cached: cached.status.to_string(),
                    current: current.status.to_string(),
                }
            }
            Err(e) => e,
        }
    }

    async fn pursuit_stale(&self, cached: &Pursuit) -> ClientError {
        match self.api.get_pursuit(cached.pursuit_id).await {
            Ok(current) => {
                self.store_pursuit(&current);
                tracing::info!(
                    pursuit_id = %cached.pursuit_id,
                    cached = %cached.stage,
                    current = %current.stage,
                    "stale pursuit refreshed"
                );
                ClientError::StaleRead {
                    entity: EntityKind::Pursuit,
                    id: cached.pursuit_id,
                    cached: cached.stage.to_string(),
                    current: current.stage.to_string(),
                }
            }
            Err(e) => e,
        }
    }

    pub async fn update_candidate_status(
        &self,
        id: Uuid,
        to: CandidateStatus,
        note: Option<String>,
    ) -> Result<Candidate, ClientError> {
        let _permit = self.acquire(id).await?;
        let cached = self.checked_candidate(id, to).await?;

        match self.api.update_candidate_status(id, to, note).await {
            Ok(updated) => {
                self.store_candidate(&updated);
                Ok(updated)
            }
            Err(e) if e.is_invalid_transition() => Err(self.candidate_stale(&cached).await),
            Err(e) => Err(e),
        }
    }

    /// Promote a candidate. On success both the candidate (now `promoted`)
    /// and the new pursuit are cached.
    pub async fn promote_candidate(
        &self,
        id: Uuid,
        request: PromotionRequest,
    ) -> Result<Pursuit, ClientError> {
        let _permit = self.acquire(id).await?;
        let cached = self.checked_candidate(id, CandidateStatus::Promoted).await?;

        match self.api.promote_candidate(id, request).await {
            Ok(pursuit) => {
                self.store_pursuit(&pursuit);
                match self.api.get_candidate(id).await {
                    Ok(candidate) => self.store_candidate(&candidate),
                    Err(e) => {
                        tracing::warn!(candidate_id = %id, "could not refresh promoted candidate: {}", e);
                        if let Ok(mut cache) = self.candidates.write() {
                            cache.remove(&id);
                        }
                    }
                }
                Ok(pursuit)
            }
            Err(e) if e.is_invalid_transition() => Err(self.candidate_stale(&cached).await),
            Err(e) => Err(e),
        }
    }

    async fn pursuit_command<F, Fut>(
        &self,
        id: Uuid,
        to: PursuitStage,
        call: F,
    ) -> Result<Pursuit, ClientError>
    where
        F: FnOnce(Arc<A>) -> Fut,
        Fut: Future<Output = Result<Pursuit, ClientError>>,
    {
        let _permit = self.acquire(id).await?;
        let cached = self.checked_pursuit(id, to).await?;

        match call(self.api.clone()).await {
            Ok(updated) => {
                self.store_pursuit(&updated);
                Ok(updated)
            }
            Err(e) if e.is_invalid_transition() => Err(self.pursuit_stale(&cached).await),
            Err(e) => Err(e),
        }
    }

    pub async fn advance_pursuit(
        &self,
        id: Uuid,
        to: PursuitStage,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.pursuit_command(id, to, |api| async move {
            api.update_pursuit_stage(id, to, note).await
        })
        .await
    }

    pub async fn submit_pursuit(
        &self,
        id: Uuid,
        forecast_value: Option<f64>,
        note: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.pursuit_command(id, PursuitStage::Submit, |api| async move {
            api.submit_pursuit(id, forecast_value, note).await
        })
        .await
    }

    pub async fn mark_won(
        &self,
        id: Uuid,
        value: Option<f64>,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.pursuit_command(id, PursuitStage::Won, |api| async move {
            api.mark_won(id, value, notes).await
        })
        .await
    }

    pub async fn mark_lost(
        &self,
        id: Uuid,
        reason: String,
        notes: Option<String>,
    ) -> Result<Pursuit, ClientError> {
        self.pursuit_command(id, PursuitStage::Lost, |api| async move {
            api.mark_lost(id, reason, notes).await
        })
        .await
    }
}
