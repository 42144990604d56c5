// pursuit.rs — Pursuit: an active deal created by promoting one Candidate.
//
// Stage gate:
//   qual → pink → red → submit → won
//   (any open stage) → lost
//
// Entering pink, red or submit is additionally gated on the checklist items
// whose `required_for_stage` equals the target stage. The gate lives in the
// pipeline (it needs the checklist); this module only knows the table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::Candidate;
use crate::error::PipelineError;
use crate::lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PursuitStage {
    Qual,
    Pink,
    Red,
    Submit,
    Won,
    Lost,
}

impl PursuitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PursuitStage::Qual => "qual",
            PursuitStage::Pink => "pink",
            PursuitStage::Red => "red",
            PursuitStage::Submit => "submit",
            PursuitStage::Won => "won",
            PursuitStage::Lost => "lost",
        }
    }

    /// Stages whose entry is guarded by the checklist gate.
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            PursuitStage::Pink | PursuitStage::Red | PursuitStage::Submit
        )
    }

    /// The next stage on the happy path, if any.
    pub fn next(&self) -> Option<PursuitStage> {
        match self {
            PursuitStage::Qual => Some(PursuitStage::Pink),
            PursuitStage::Pink => Some(PursuitStage::Red),
            PursuitStage::Red => Some(PursuitStage::Submit),
            PursuitStage::Submit => Some(PursuitStage::Won),
            PursuitStage::Won | PursuitStage::Lost => None,
        }
    }
}

impl fmt::Display for PursuitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PursuitStage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status(s)
    }
}

impl Lifecycle for PursuitStage {
    const ENTITY: EntityKind = EntityKind::Pursuit;
    const ALL: &'static [Self] = &[
        PursuitStage::Qual,
        PursuitStage::Pink,
        PursuitStage::Red,
        PursuitStage::Submit,
        PursuitStage::Won,
        PursuitStage::Lost,
    ];

    fn targets(self) -> &'static [Self] {
        use PursuitStage::*;
        match self {
            Qual => &[Pink, Lost],
            Pink => &[Red, Lost],
            Red => &[Submit, Lost],
            Submit => &[Won, Lost],
            Won | Lost => &[],
        }
    }
}

/// How a pursuit ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PursuitOutcome {
    Won {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    Lost {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

/// Input for promoting a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub title: String,
    pub forecast_value: f64,
    pub due_date: DateTime<Utc>,
    /// 0–100. Defaults to the candidate's confidence.
    #[serde(default)]
    pub win_probability: Option<u8>,
    /// Whether the deal is expected to carry a checklist. Informational;
    /// required items gate stage entry either way. Defaults to true.
    #[serde(default = "default_true")]
    pub checklist_required: bool,
}

fn default_true() -> bool {
    true
}

/// An active deal progressing through the stage gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pursuit {
    pub pursuit_id: Uuid,
    pub org_id: String,

    /// The promoted candidate (lookup only).
    pub candidate_id: Uuid,

    pub title: String,
    pub stage: PursuitStage,

    pub forecast_value: f64,

    /// 0–100.
    pub win_probability: u8,

    pub checklist_required: bool,

    /// Every checklist item is complete. Informational; the gate re-checks.
    pub checklist_complete: bool,

    pub due_date: DateTime<Utc>,

    /// When the current stage was entered (drives the proposal SLA).
    pub stage_entered_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PursuitOutcome>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pursuit {
    /// Build the pursuit a promotion creates, in `qual`.
    pub fn from_promotion(
        candidate: &Candidate,
        request: PromotionRequest,
    ) -> Result<Self, PipelineError> {
        if request.title.trim().is_empty() {
            return Err(PipelineError::Validation {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if !request.forecast_value.is_finite() || request.forecast_value < 0.0 {
            return Err(PipelineError::Validation {
                field: "forecast_value",
                reason: format!("{} is not a non-negative amount", request.forecast_value),
            });
        }
        let win_probability = request.win_probability.unwrap_or(candidate.confidence);
        if win_probability > 100 {
            return Err(PipelineError::Validation {
                field: "win_probability",
                reason: format!("{} is outside 0–100", win_probability),
            });
        }
        let now = Utc::now();
        Ok(Self {
            pursuit_id: Uuid::new_v4(),
            org_id: candidate.org_id.clone(),
            candidate_id: candidate.candidate_id,
            title: request.title,
            stage: PursuitStage::Qual,
            forecast_value: request.forecast_value,
            win_probability,
            checklist_required: request.checklist_required,
            checklist_complete: true,
            due_date: request.due_date,
            stage_entered_at: now,
            outcome: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `to` after checking the table only. Gate checks are the
    /// caller's responsibility (see `Pipeline::advance_pursuit`).
    pub fn transition(&mut self, to: PursuitStage) -> Result<(), PipelineError> {
        self.stage = check_transition(self.pursuit_id, self.stage, to)?;
        let now = Utc::now();
        self.stage_entered_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.stage.is_terminal()
    }
}
