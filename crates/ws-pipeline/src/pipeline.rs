// pipeline.rs — The state transition validator and the mutations it guards.
//
// Every mutation follows the same shape:
//   1. load the current record (NotFound if missing)
//   2. validate against the transition table, and for pursuits the
//      checklist gate (InvalidTransition / ChecklistIncomplete)
//   3. persist
//   4. emit one WorkEvent per changed record
//
// Nothing is written when validation fails.

use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::candidate::{Candidate, CandidateStatus, IcpSummary, NewCandidate};
use crate::checklist::{all_complete, evaluate_gate, ChecklistItem, ChecklistUpdate, GateReport};
use crate::drip::{DripSchedule, DripStatus, DripStep};
use crate::error::PipelineError;
use crate::events::EventDispatcher;
use crate::lifecycle::{check_transition, EntityKind, Lifecycle};
use crate::proposal::{Proposal, ProposalStatus};
use crate::pursuit::{PromotionRequest, Pursuit, PursuitOutcome, PursuitStage};
use crate::signal::{Signal, SignalEnrichment, SignalStatus};
use crate::store::PipelineStore;
use crate::work_event::{WorkEvent, WorkEventPayload};

pub struct Pipeline {
    store: PipelineStore,
    dispatcher: EventDispatcher,
}

impl Pipeline {
    pub fn new(store: PipelineStore, dispatcher: EventDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Open a pipeline over a store directory with no sinks attached.
    pub fn open(store_dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Ok(Self::new(
            PipelineStore::open(store_dir)?,
            EventDispatcher::new(),
        ))
    }

    pub fn store(&self) -> &PipelineStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    fn emit(&self, org_id: &str, entity: EntityKind, id: Uuid, payload: WorkEventPayload) {
        let event = WorkEvent::new(org_id, entity, id, payload);
        self.dispatcher.dispatch(&event);
    }

    // ── Signals ────────────────────────────────────────────────────

    pub fn ingest_signal(&self, signal: Signal) -> Result<Signal, PipelineError> {
        self.store.signals.save(&signal)?;
        tracing::info!(signal_id = %signal.signal_id, source = %signal.source, "signal ingested");
        self.emit(
            &signal.org_id,
            EntityKind::Signal,
            signal.signal_id,
            WorkEventPayload::SignalIngested {
                source: signal.source.to_string(),
                urgency_score: signal.urgency_score,
            },
        );
        Ok(signal)
    }

    /// Triage or ignore a signal. `candidate_created` is only reachable through
    /// [`Pipeline::create_candidate_from_signal`].
    pub fn transition_signal(&self, id: Uuid, to: SignalStatus) -> Result<Signal, PipelineError> {
        let mut signal = self.store.signals.require(id)?;
        if to == SignalStatus::CandidateCreated {
            // Surface the table rejection first if there is one.
            check_transition(id, signal.status, to)?;
            return Err(PipelineError::Validation {
                field: "status",
                reason: "candidate_created is set by creating a candidate from the signal"
                    .to_string(),
            });
        }
        let from = signal.status;
        signal.transition(to)?;
        self.store.signals.save(&signal)?;
        tracing::info!(signal_id = %id, %from, %to, "signal transitioned");
        self.emit(
            &signal.org_id,
            EntityKind::Signal,
            id,
            WorkEventPayload::SignalStatusChanged {
                from: from.to_string(),
                to: to.to_string(),
            },
        );
        Ok(signal)
    }

    pub fn enrich_signal(
        &self,
        id: Uuid,
        enrichment: SignalEnrichment,
    ) -> Result<Signal, PipelineError> {
        let mut signal = self.store.signals.require(id)?;
        let payload = WorkEventPayload::SignalEnriched {
            contact_id: enrichment.contact_id.clone(),
            client_id: enrichment.client_id.clone(),
        };
        signal.record_enrichment(enrichment);
        self.store.signals.save(&signal)?;
        self.emit(&signal.org_id, EntityKind::Signal, id, payload);
        Ok(signal)
    }

    // ── Candidates ─────────────────────────────────────────────────

    pub fn create_candidate(
        &self,
        org_id: &str,
        input: NewCandidate,
    ) -> Result<Candidate, PipelineError> {
        let candidate = Candidate::new(org_id, input)?;
        self.store.candidates.save(&candidate)?;
        tracing::info!(candidate_id = %candidate.candidate_id, "candidate created");
        self.emit(
            org_id,
            EntityKind::Candidate,
            candidate.candidate_id,
            WorkEventPayload::CandidateCreated {
                signal_id: None,
                title: candidate.title.clone(),
            },
        );
        Ok(candidate)
    }

    /// Create the one candidate a signal may produce and close the signal.
    pub fn create_candidate_from_signal(
        &self,
        signal_id: Uuid,
        input: NewCandidate,
    ) -> Result<Candidate, PipelineError> {
        let mut signal = self.store.signals.require(signal_id)?;
        let from = signal.status;
        check_transition(signal_id, from, SignalStatus::CandidateCreated)?;

        if !self.store.candidates_from_signal(signal_id)?.is_empty() {
            return Err(PipelineError::InvalidTransition {
                entity: EntityKind::Signal,
                id: signal_id,
                from: from.to_string(),
                to: SignalStatus::CandidateCreated.to_string(),
            });
        }

        let mut candidate = Candidate::new(&signal.org_id, input)?;
        candidate.signal_id = Some(signal_id);
        signal.transition(SignalStatus::CandidateCreated)?;

        self.store.candidates.save(&candidate)?;
        if let Err(e) = self.store.signals.save(&signal) {
            if let Err(cleanup) = self.store.candidates.delete(candidate.candidate_id) {
                tracing::error!(
                    candidate_id = %candidate.candidate_id,
                    "failed to roll back candidate after signal save error: {}",
                    cleanup
                );
            }
            return Err(e);
        }
        tracing::info!(
            candidate_id = %candidate.candidate_id,
            %signal_id,
            "candidate created from signal"
        );

        self.emit(
            &signal.org_id,
            EntityKind::Candidate,
            candidate.candidate_id,
            WorkEventPayload::CandidateCreated {
                signal_id: Some(signal_id),
                title: candidate.title.clone(),
            },
        );
        self.emit(
            &signal.org_id,
            EntityKind::Signal,
            signal_id,
            WorkEventPayload::SignalStatusChanged {
                from: from.to_string(),
                to: signal.status.to_string(),
            },
        );
        Ok(candidate)
    }

    /// Move a candidate along its table. Promotion needs a pursuit, so
    /// `promoted` is only reachable through [`Pipeline::promote_candidate`].
    pub fn transition_candidate(
        &self,
        id: Uuid,
        to: CandidateStatus,
        note: Option<String>,
    ) -> Result<Candidate, PipelineError> {
        let mut candidate = self.store.candidates.require(id)?;
        let from = candidate.status;
        if to == CandidateStatus::Promoted {
            check_transition(id, from, to)?;
            return Err(PipelineError::Validation {
                field: "status",
                reason: "promotion creates a pursuit; promote the candidate instead".to_string(),
            });
        }
        candidate.transition(to)?;
        self.store.candidates.save(&candidate)?;
        tracing::info!(candidate_id = %id, %from, %to, "candidate transitioned");
        self.emit(
            &candidate.org_id,
            EntityKind::Candidate,
            id,
            WorkEventPayload::CandidateStatusChanged {
                from: from.to_string(),
                to: to.to_string(),
                note,
            },
        );
        Ok(candidate)
    }

    /// Attach the ICP summary produced by the scoring provider.
    pub fn set_icp(&self, id: Uuid, icp: IcpSummary) -> Result<Candidate, PipelineError> {
        if !(0.0..=100.0).contains(&icp.score) {
            return Err(PipelineError::Validation {
                field: "icp.score",
                reason: format!("{} is outside 0–100", icp.score),
            });
        }
        let mut candidate = self.store.candidates.require(id)?;
        candidate.icp = Some(icp);
        candidate.updated_at = Utc::now();
        self.store.candidates.save(&candidate)?;
        Ok(candidate)
    }

    /// Promote a candidate: create the pursuit in `qual`, then mark the
    /// candidate promoted. If the candidate cannot be saved the pursuit is
    /// removed again so no orphan is left behind.
    pub fn promote_candidate(
        &self,
        id: Uuid,
        request: PromotionRequest,
    ) -> Result<(Candidate, Pursuit), PipelineError> {
        let mut candidate = self.store.candidates.require(id)?;
        let from = candidate.status;
        let pursuit = Pursuit::from_promotion(&candidate, request)?;
        candidate.promote(pursuit.pursuit_id)?;

        self.store.pursuits.save(&pursuit)?;
        if let Err(e) = self.store.candidates.save(&candidate) {
            if let Err(cleanup) = self.store.pursuits.delete(pursuit.pursuit_id) {
                tracing::error!(
                    pursuit_id = %pursuit.pursuit_id,
                    "failed to roll back pursuit after promotion error: {}",
                    cleanup
                );
            }
            return Err(e);
        }
        tracing::info!(
            candidate_id = %id,
            pursuit_id = %pursuit.pursuit_id,
            "candidate promoted"
        );

        self.emit(
            &candidate.org_id,
            EntityKind::Candidate,
            id,
            WorkEventPayload::CandidateStatusChanged {
                from: from.to_string(),
                to: CandidateStatus::Promoted.to_string(),
                note: None,
            },
        );
        self.emit(
            &candidate.org_id,
            EntityKind::Candidate,
            id,
            WorkEventPayload::CandidatePromoted {
                pursuit_id: pursuit.pursuit_id,
            },
        );
        Ok((candidate, pursuit))
    }

    /// Put a candidate on a nurture sequence and request the drip dispatcher.
    ///
    /// `triaged` and `on_hold` candidates move to `nurture`; `nurture`
    /// candidates get additional rows. Anything else is rejected.
    pub fn schedule_drip(
        &self,
        candidate_id: Uuid,
        start: DateTime<Utc>,
        steps: &[DripStep],
    ) -> Result<Vec<DripSchedule>, PipelineError> {
        let mut candidate = self.store.candidates.require(candidate_id)?;
        let from = candidate.status;
        if from != CandidateStatus::Nurture {
            candidate.transition(CandidateStatus::Nurture)?;
        } else {
            candidate.touch();
        }

        let rows = DripSchedule::plan(candidate_id, &candidate.org_id, start, steps);
        for row in &rows {
            self.store.drips.save(row)?;
        }
        self.store.candidates.save(&candidate)?;
        tracing::info!(%candidate_id, steps = rows.len(), "drip sequence scheduled");

        if from != candidate.status {
            self.emit(
                &candidate.org_id,
                EntityKind::Candidate,
                candidate_id,
                WorkEventPayload::CandidateStatusChanged {
                    from: from.to_string(),
                    to: candidate.status.to_string(),
                    note: Some("drip scheduled".to_string()),
                },
            );
        }
        self.emit(
            &candidate.org_id,
            EntityKind::Candidate,
            candidate_id,
            WorkEventPayload::DripRequested { candidate_id },
        );
        Ok(rows)
    }

    pub fn mark_drip(
        &self,
        schedule_id: Uuid,
        to: DripStatus,
    ) -> Result<DripSchedule, PipelineError> {
        let mut row = self.store.drips.require(schedule_id)?;
        let from = row.status;
        row.transition(to)?;
        self.store.drips.save(&row)?;
        self.emit(
            &row.org_id,
            EntityKind::DripSchedule,
            schedule_id,
            WorkEventPayload::DripStatusChanged {
                schedule_id,
                from: from.to_string(),
                to: to.to_string(),
            },
        );
        Ok(row)
    }

    // ── Pursuits ───────────────────────────────────────────────────

    /// Informational gate check; never changes anything.
    pub fn gate_report(
        &self,
        pursuit_id: Uuid,
        target: PursuitStage,
    ) -> Result<GateReport, PipelineError> {
        self.store.pursuits.require(pursuit_id)?;
        let items = self.store.checklist_for(pursuit_id)?;
        Ok(evaluate_gate(&items, target))
    }

    /// Move a pursuit to `to`, enforcing the table and, for pink/red/submit,
    /// the checklist gate for the target stage.
    pub fn advance_pursuit(
        &self,
        id: Uuid,
        to: PursuitStage,
        note: Option<String>,
    ) -> Result<Pursuit, PipelineError> {
        let pursuit = self.store.pursuits.require(id)?;
        self.apply_stage(pursuit, to, note, None)
    }

    /// Advance to `submit`, optionally refreshing the forecast value.
    pub fn submit_pursuit(
        &self,
        id: Uuid,
        forecast_value: Option<f64>,
        note: Option<String>,
    ) -> Result<Pursuit, PipelineError> {
        let mut pursuit = self.store.pursuits.require(id)?;
        if let Some(value) = forecast_value {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Validation {
                    field: "forecast_value",
                    reason: format!("{} is not a non-negative amount", value),
                });
            }
            pursuit.forecast_value = value;
        }
        self.apply_stage(pursuit, PursuitStage::Submit, note, None)
    }

    pub fn mark_won(
        &self,
        id: Uuid,
        value: Option<f64>,
        notes: Option<String>,
    ) -> Result<Pursuit, PipelineError> {
        let pursuit = self.store.pursuits.require(id)?;
        let outcome = PursuitOutcome::Won {
            value,
            notes: notes.clone(),
        };
        self.apply_stage(pursuit, PursuitStage::Won, notes, Some(outcome))
    }

    pub fn mark_lost(
        &self,
        id: Uuid,
        reason: impl Into<String>,
        notes: Option<String>,
    ) -> Result<Pursuit, PipelineError> {
        let pursuit = self.store.pursuits.require(id)?;
        let reason = reason.into();
        let outcome = PursuitOutcome::Lost {
            reason: reason.clone(),
            notes,
        };
        self.apply_stage(pursuit, PursuitStage::Lost, Some(reason), Some(outcome))
    }

    fn apply_stage(
        &self,
        mut pursuit: Pursuit,
        to: PursuitStage,
        note: Option<String>,
        outcome: Option<PursuitOutcome>,
    ) -> Result<Pursuit, PipelineError> {
        let id = pursuit.pursuit_id;
        let from = pursuit.stage;
        check_transition(id, from, to)?;

        if to.is_gated() {
            let items = self.store.checklist_for(id)?;
            let report = evaluate_gate(&items, to);
            if !report.satisfied {
                tracing::info!(
                    pursuit_id = %id,
                    stage = %to,
                    missing = ?report.missing,
                    "stage advance blocked by checklist"
                );
                return Err(PipelineError::ChecklistIncomplete {
                    pursuit_id: id,
                    stage: to,
                    missing: report.missing,
                });
            }
        }

        pursuit.transition(to)?;
        if to.is_terminal() {
            pursuit.outcome = outcome.or(Some(match to {
                PursuitStage::Won => PursuitOutcome::Won {
                    value: None,
                    notes: None,
                },
                _ => PursuitOutcome::Lost {
                    reason: "unspecified".to_string(),
                    notes: None,
                },
            }));
        }
        self.store.pursuits.save(&pursuit)?;
        tracing::info!(pursuit_id = %id, %from, %to, "pursuit stage changed");

        self.emit(
            &pursuit.org_id,
            EntityKind::Pursuit,
            id,
            WorkEventPayload::PursuitStageChanged {
                from: from.to_string(),
                to: to.to_string(),
                note,
            },
        );
        Ok(pursuit)
    }

    pub fn checklist(&self, pursuit_id: Uuid) -> Result<Vec<ChecklistItem>, PipelineError> {
        self.store.pursuits.require(pursuit_id)?;
        self.store.checklist_for(pursuit_id)
    }

    pub fn add_checklist_item(
        &self,
        pursuit_id: Uuid,
        name: &str,
        required_for_stage: PursuitStage,
    ) -> Result<ChecklistItem, PipelineError> {
        let pursuit = self.store.pursuits.require(pursuit_id)?;
        let item = ChecklistItem::new(pursuit_id, &pursuit.org_id, name, required_for_stage)?;
        self.store.checklist.save(&item)?;
        self.refresh_checklist_flag(pursuit)?;
        Ok(item)
    }

    /// Complete or reopen items. Never moves the pursuit; only the
    /// informational `checklist_complete` flag is recomputed.
    pub fn update_checklist(
        &self,
        pursuit_id: Uuid,
        updates: &[ChecklistUpdate],
    ) -> Result<Vec<ChecklistItem>, PipelineError> {
        let pursuit = self.store.pursuits.require(pursuit_id)?;
        let mut items = self.store.checklist_for(pursuit_id)?;

        // Validate every update before writing any of them.
        for update in updates {
            if !items.iter().any(|i| i.item_id == update.item_id) {
                return Err(PipelineError::NotFound {
                    entity: EntityKind::ChecklistItem,
                    id: update.item_id,
                });
            }
        }

        for update in updates {
            let Some(item) = items.iter_mut().find(|i| i.item_id == update.item_id) else {
                continue;
            };
            if item.completed == update.completed {
                continue;
            }
            if update.completed {
                item.complete(update.completed_by.clone());
            } else {
                item.reopen();
            }
            self.store.checklist.save(item)?;
            self.emit(
                &item.org_id,
                EntityKind::ChecklistItem,
                item.item_id,
                WorkEventPayload::ChecklistItemUpdated {
                    item_id: item.item_id,
                    name: item.name.clone(),
                    completed: item.completed,
                },
            );
        }

        self.refresh_checklist_flag(pursuit)?;
        Ok(items)
    }

    fn refresh_checklist_flag(&self, mut pursuit: Pursuit) -> Result<(), PipelineError> {
        let complete = all_complete(&self.store.checklist_for(pursuit.pursuit_id)?);
        if pursuit.checklist_complete != complete {
            pursuit.checklist_complete = complete;
            pursuit.updated_at = Utc::now();
            self.store.pursuits.save(&pursuit)?;
        }
        Ok(())
    }

    // ── Proposals ──────────────────────────────────────────────────

    pub fn add_proposal(&self, pursuit_id: Uuid, title: &str) -> Result<Proposal, PipelineError> {
        let pursuit = self.store.pursuits.require(pursuit_id)?;
        if !pursuit.is_open() {
            return Err(PipelineError::Validation {
                field: "pursuit",
                reason: format!("pursuit is {} and takes no new proposals", pursuit.stage),
            });
        }
        let existing = self.store.proposals_for(pursuit_id)?;
        let proposal = Proposal::next_for(pursuit_id, &pursuit.org_id, title, &existing);
        self.store.proposals.save(&proposal)?;
        Ok(proposal)
    }

    pub fn transition_proposal(
        &self,
        proposal_id: Uuid,
        to: ProposalStatus,
    ) -> Result<Proposal, PipelineError> {
        let mut proposal = self.store.proposals.require(proposal_id)?;
        let from = proposal.status;
        proposal.transition(to)?;
        self.store.proposals.save(&proposal)?;
        self.emit(
            &proposal.org_id,
            EntityKind::Proposal,
            proposal_id,
            WorkEventPayload::ProposalStatusChanged {
                version: proposal.version,
                from: from.to_string(),
                to: to.to_string(),
            },
        );
        Ok(proposal)
    }
}
