// evaluator.rs — Per-entity SLA assessment.
//
// An entity's badge is the worst of every applicable rule's badge and, for
// pursuits, the badge of its own due date. The due date is reported as a
// verdict of its own under [`DUE_DATE_RULE`] so a missed deadline is
// recorded as a breach like any rule. Terminal entities and entities no rule
// applies to have no badge. Evaluation is pure and never fails.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::badge::{evaluate, SlaBadge, DEFAULT_AMBER_WINDOW_HOURS};
use crate::error::SlaError;
use crate::rule::{default_rules, SlaRule, SlaSubject};

/// Rule name under which a pursuit's own due date is reported.
pub const DUE_DATE_RULE: &str = "due_date";

/// One applicable rule's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAssessment {
    pub rule_name: String,
    pub expected_by: DateTime<Utc>,
    pub badge: SlaBadge,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assessment {
    /// Worst badge across rules and due date. `None` when nothing applies.
    pub badge: Option<SlaBadge>,
    pub rules: Vec<RuleAssessment>,
    /// The subject's own deadline, named [`DUE_DATE_RULE`].
    pub due_date: Option<RuleAssessment>,
}

impl Assessment {
    /// Verdicts currently red, the due date included.
    pub fn breached(&self) -> impl Iterator<Item = &RuleAssessment> {
        self.rules
            .iter()
            .chain(self.due_date.iter())
            .filter(|r| r.badge == SlaBadge::Red)
    }

    pub fn due_date_badge(&self) -> Option<SlaBadge> {
        self.due_date.as_ref().map(|d| d.badge)
    }
}

#[derive(Debug, Clone)]
pub struct SlaEvaluator {
    rules: Vec<SlaRule>,
    amber_window: Duration,
}

impl SlaEvaluator {
    /// Build an evaluator, rejecting invalid rules up front.
    pub fn new(rules: Vec<SlaRule>, amber_window_hours: f64) -> Result<Self, SlaError> {
        for rule in &rules {
            rule.validate()?;
        }
        if !amber_window_hours.is_finite() || amber_window_hours < 0.0 {
            return Err(SlaError::InvalidRule {
                rule_name: "amber_window".to_string(),
                reason: format!("must be a non-negative number of hours, got {}", amber_window_hours),
            });
        }
        Ok(Self {
            rules,
            amber_window: Duration::milliseconds((amber_window_hours * 3_600_000.0).round() as i64),
        })
    }

    pub fn rules(&self) -> &[SlaRule] {
        &self.rules
    }

    pub fn amber_window(&self) -> Duration {
        self.amber_window
    }

    /// Badge for a bare deadline using this evaluator's window.
    pub fn badge_for(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> SlaBadge {
        evaluate(due, now, self.amber_window)
    }

    pub fn assess(&self, subject: &SlaSubject, now: DateTime<Utc>) -> Assessment {
        if subject.terminal {
            return Assessment::default();
        }

        let rules: Vec<RuleAssessment> = self
            .rules
            .iter()
            .filter_map(|rule| {
                rule.expected_by(subject).map(|expected_by| RuleAssessment {
                    rule_name: rule.rule_name.clone(),
                    expected_by,
                    badge: self.badge_for(expected_by, now),
                })
            })
            .collect();

        let due_date = subject.due_date.map(|due| RuleAssessment {
            rule_name: DUE_DATE_RULE.to_string(),
            expected_by: due,
            badge: self.badge_for(due, now),
        });
        let badge = rules
            .iter()
            .chain(due_date.iter())
            .map(|r| r.badge)
            .max();

        Assessment {
            badge,
            rules,
            due_date,
        }
    }
}

impl Default for SlaEvaluator {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            amber_window: Duration::hours(DEFAULT_AMBER_WINDOW_HOURS),
        }
    }
}
