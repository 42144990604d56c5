// checklist.rs — Pursuit checklist items and the stage gate.
//
// An item is "required" for a target stage iff its `required_for_stage`
// equals that stage. Items for other stages are irrelevant to the check.
// Completing or reopening an item never moves the pursuit; the gate is only
// consulted when a transition is requested.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pursuit::PursuitStage;

/// One named prerequisite for entering a pursuit stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item_id: Uuid,
    pub pursuit_id: Uuid,
    pub org_id: String,
    pub name: String,

    /// Must be one of pink, red, submit.
    pub required_for_stage: PursuitStage,

    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistItem {
    pub fn new(
        pursuit_id: Uuid,
        org_id: impl Into<String>,
        name: impl Into<String>,
        required_for_stage: PursuitStage,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineError::Validation {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        if !required_for_stage.is_gated() {
            return Err(PipelineError::Validation {
                field: "required_for_stage",
                reason: format!(
                    "'{}' is not a gated stage (expected pink, red or submit)",
                    required_for_stage
                ),
            });
        }
        let now = Utc::now();
        Ok(Self {
            item_id: Uuid::new_v4(),
            pursuit_id,
            org_id: org_id.into(),
            name,
            required_for_stage,
            completed: false,
            completed_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn complete(&mut self, by: Option<String>) {
        let now = Utc::now();
        self.completed = true;
        self.completed_by = by;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_by = None;
        self.completed_at = None;
        self.updated_at = Utc::now();
    }
}

/// A requested change to one checklist item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistUpdate {
    pub item_id: Uuid,
    pub completed: bool,
    #[serde(default)]
    pub completed_by: Option<String>,
}

/// Result of checking the gate for one target stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub stage: PursuitStage,
    pub satisfied: bool,
    /// Names of incomplete required items, in checklist order.
    pub missing: Vec<String>,
}

/// Evaluate the gate for `target` over a pursuit's checklist.
pub fn evaluate_gate(items: &[ChecklistItem], target: PursuitStage) -> GateReport {
    let missing: Vec<String> = items
        .iter()
        .filter(|item| item.required_for_stage == target && !item.completed)
        .map(|item| item.name.clone())
        .collect();
    GateReport {
        stage: target,
        satisfied: missing.is_empty(),
        missing,
    }
}

/// True when every item (for any stage) is complete. Vacuously true when empty.
pub fn all_complete(items: &[ChecklistItem]) -> bool {
    items.iter().all(|item| item.completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pursuit_id: Uuid, name: &str, stage: PursuitStage) -> ChecklistItem {
        ChecklistItem::new(pursuit_id, "org-1", name, stage).unwrap()
    }

    #[test]
    fn only_items_for_the_target_stage_count() {
        let pid = Uuid::new_v4();
        let items = vec![
            item(pid, "reference check", PursuitStage::Pink),
            item(pid, "pricing review", PursuitStage::Red),
        ];
        let pink = evaluate_gate(&items, PursuitStage::Pink);
        assert!(!pink.satisfied);
        assert_eq!(pink.missing, vec!["reference check".to_string()]);

        let submit = evaluate_gate(&items, PursuitStage::Submit);
        assert!(submit.satisfied);
        assert!(submit.missing.is_empty());
    }

    #[test]
    fn completing_satisfies_and_reopening_unsatisfies() {
        let pid = Uuid::new_v4();
        let mut items = vec![item(pid, "reference check", PursuitStage::Pink)];
        items[0].complete(Some("dana".into()));
        assert!(evaluate_gate(&items, PursuitStage::Pink).satisfied);
        assert_eq!(items[0].completed_by.as_deref(), Some("dana"));

        items[0].reopen();
        assert!(!evaluate_gate(&items, PursuitStage::Pink).satisfied);
        assert!(items[0].completed_at.is_none());
    }

    #[test]
    fn items_cannot_target_ungated_stages() {
        let err = ChecklistItem::new(Uuid::new_v4(), "org-1", "x", PursuitStage::Won).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation {
                field: "required_for_stage",
                ..
            }
        ));
    }

    #[test]
    fn all_complete_is_vacuous_for_empty_checklists() {
        assert!(all_complete(&[]));
        let pid = Uuid::new_v4();
        assert!(!all_complete(&[item(pid, "a", PursuitStage::Red)]));
    }
}
