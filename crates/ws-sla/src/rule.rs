// rule.rs — SLA rules and the entity snapshots they are evaluated against.
//
// A rule says: for entities of this type, while their status is one of
// `applies_to`, the next action is expected within `threshold_hours` of the
// anchor timestamp.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::{Candidate, EntityKind, Lifecycle, Pursuit, Signal};

use crate::error::SlaError;
use crate::evaluator::DUE_DATE_RULE;

/// Which timestamp the threshold is measured from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlaAnchor {
    Created,
    StageEntered,
    LastTouch,
}

impl fmt::Display for SlaAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlaAnchor::Created => "created",
            SlaAnchor::StageEntered => "stage_entered",
            SlaAnchor::LastTouch => "last_touch",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaRule {
    pub rule_name: String,
    pub entity_type: EntityKind,
    pub anchor: SlaAnchor,
    pub threshold_hours: f64,
    /// Status names (snake_case) during which the rule is active.
    pub applies_to: Vec<String>,
}

impl SlaRule {
    pub fn new(
        rule_name: impl Into<String>,
        entity_type: EntityKind,
        anchor: SlaAnchor,
        threshold_hours: f64,
        applies_to: &[&str],
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            entity_type,
            anchor,
            threshold_hours,
            applies_to: applies_to.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), SlaError> {
        if self.rule_name.trim().is_empty() {
            return Err(SlaError::InvalidRule {
                rule_name: self.rule_name.clone(),
                reason: "rule_name must not be empty".to_string(),
            });
        }
        if self.rule_name == DUE_DATE_RULE {
            return Err(SlaError::InvalidRule {
                rule_name: self.rule_name.clone(),
                reason: "rule_name is reserved for pursuit due dates".to_string(),
            });
        }
        if !self.threshold_hours.is_finite() || self.threshold_hours <= 0.0 {
            return Err(SlaError::InvalidRule {
                rule_name: self.rule_name.clone(),
                reason: format!("threshold_hours must be positive, got {}", self.threshold_hours),
            });
        }
        if self.applies_to.is_empty() {
            return Err(SlaError::InvalidRule {
                rule_name: self.rule_name.clone(),
                reason: "applies_to must name at least one status".to_string(),
            });
        }
        Ok(())
    }

    pub fn threshold(&self) -> Duration {
        Duration::milliseconds((self.threshold_hours * 3_600_000.0).round() as i64)
    }

    pub fn applies(&self, subject: &SlaSubject) -> bool {
        subject.entity_type == self.entity_type
            && self.applies_to.iter().any(|s| *s == subject.status)
    }

    /// `anchor + threshold`, or `None` when the rule does not apply or the
    /// subject has no timestamp for this anchor.
    pub fn expected_by(&self, subject: &SlaSubject) -> Option<DateTime<Utc>> {
        if !self.applies(subject) {
            return None;
        }
        subject.anchor(self.anchor).map(|at| at + self.threshold())
    }
}

/// Built-in rules: triage new signals within a day, respond to open
/// candidates within four days, keep pink/red pursuits moving within three.
pub fn default_rules() -> Vec<SlaRule> {
    vec![
        SlaRule::new("triage", EntityKind::Signal, SlaAnchor::Created, 24.0, &["new"]),
        SlaRule::new(
            "response",
            EntityKind::Candidate,
            SlaAnchor::LastTouch,
            96.0,
            &["new", "triaged", "nurture", "on_hold"],
        ),
        SlaRule::new(
            "proposal",
            EntityKind::Pursuit,
            SlaAnchor::StageEntered,
            72.0,
            &["pink", "red"],
        ),
    ]
}

/// The timestamps of one entity that SLA rules can anchor on.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaSubject {
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub org_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub stage_entered_at: Option<DateTime<Utc>>,
    pub last_touch_at: Option<DateTime<Utc>>,
    /// Own deadline, evaluated alongside the rules (pursuits only).
    pub due_date: Option<DateTime<Utc>>,
    /// Terminal entities never badge.
    pub terminal: bool,
}

impl SlaSubject {
    fn anchor(&self, anchor: SlaAnchor) -> Option<DateTime<Utc>> {
        match anchor {
            SlaAnchor::Created => Some(self.created_at),
            SlaAnchor::StageEntered => self.stage_entered_at,
            SlaAnchor::LastTouch => self.last_touch_at,
        }
    }
}

impl From<&Signal> for SlaSubject {
    fn from(s: &Signal) -> Self {
        Self {
            entity_type: EntityKind::Signal,
            entity_id: s.signal_id,
            org_id: s.org_id.clone(),
            status: s.status.to_string(),
            created_at: s.created_at,
            stage_entered_at: None,
            last_touch_at: None,
            due_date: None,
            terminal: s.status.is_terminal(),
        }
    }
}

impl From<&Candidate> for SlaSubject {
    fn from(c: &Candidate) -> Self {
        Self {
            entity_type: EntityKind::Candidate,
            entity_id: c.candidate_id,
            org_id: c.org_id.clone(),
            status: c.status.to_string(),
            created_at: c.created_at,
            stage_entered_at: None,
            last_touch_at: Some(c.last_touch_at),
            due_date: None,
            terminal: c.status.is_terminal(),
        }
    }
}

impl From<&Pursuit> for SlaSubject {
    fn from(p: &Pursuit) -> Self {
        Self {
            entity_type: EntityKind::Pursuit,
            entity_id: p.pursuit_id,
            org_id: p.org_id.clone(),
            status: p.stage.to_string(),
            created_at: p.created_at,
            stage_entered_at: Some(p.stage_entered_at),
            last_touch_at: None,
            due_date: Some(p.due_date),
            terminal: !p.is_open(),
        }
    }
}
