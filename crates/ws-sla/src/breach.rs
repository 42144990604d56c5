// breach.rs — SLA breach records and the JSON ledger that holds them.
//
// A breach is created the first time an entity is seen red for a given
// (entity, rule, expected_by) window. It is immutable afterwards except for
// `resolved_at`, which is stamped once the window no longer applies (status
// moved on, or the anchor moved so the expectation changed).
//
// The ledger lives in a single JSON file. Saves write a temp file and rename
// it over the ledger, so readers see either the old or the new list.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ws_pipeline::EntityKind;

use crate::error::SlaError;
use crate::evaluator::SlaEvaluator;
use crate::rule::SlaSubject;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaBreach {
    pub breach_id: Uuid,
    pub org_id: String,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub rule_name: String,
    pub expected_by: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    /// Fractional hours past `expected_by` at detection time.
    pub hours_over: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SlaBreach {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    fn same_window(&self, entity_id: Uuid, rule_name: &str, expected_by: DateTime<Utc>) -> bool {
        self.entity_id == entity_id && self.rule_name == rule_name && self.expected_by == expected_by
    }
}

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub created: Vec<SlaBreach>,
    pub resolved: Vec<SlaBreach>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.resolved.is_empty()
    }
}

#[derive(Debug)]
pub struct BreachLedger {
    path: PathBuf,
    breaches: Vec<SlaBreach>,
}

impl BreachLedger {
    /// Load the ledger at `path`, or start an empty one if the file is absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SlaError> {
        let path = path.as_ref().to_path_buf();
        let breaches = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|source| SlaError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            if json.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            Vec::new()
        };
        Ok(Self { path, breaches })
    }

    pub fn save(&self) -> Result<(), SlaError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SlaError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.breaches)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| SlaError::IoError {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| SlaError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn all(&self) -> &[SlaBreach] {
        &self.breaches
    }

    pub fn open_breaches(&self) -> impl Iterator<Item = &SlaBreach> {
        self.breaches.iter().filter(|b| b.is_open())
    }

    pub fn for_entity(&self, entity_id: Uuid) -> impl Iterator<Item = &SlaBreach> {
        self.breaches.iter().filter(move |b| b.entity_id == entity_id)
    }

    /// Evaluate every subject, record new breaches and resolve cleared ones.
    ///
    /// Only breaches of subjects passed in are considered for resolution;
    /// entities absent from `subjects` are left as they are.
    pub fn sweep(
        &mut self,
        subjects: &[SlaSubject],
        evaluator: &SlaEvaluator,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        for subject in subjects {
            let assessment = evaluator.assess(subject, now);
            let red: Vec<_> = assessment.breached().collect();

            for hit in &red {
                let exists = self.breaches.iter().any(|b| {
                    b.is_open() && b.same_window(subject.entity_id, &hit.rule_name, hit.expected_by)
                });
                if exists {
                    continue;
                }
                let hours_over = (now - hit.expected_by).num_milliseconds() as f64 / 3_600_000.0;
                let breach = SlaBreach {
                    breach_id: Uuid::new_v4(),
                    org_id: subject.org_id.clone(),
                    entity_type: subject.entity_type,
                    entity_id: subject.entity_id,
                    rule_name: hit.rule_name.clone(),
                    expected_by: hit.expected_by,
                    detected_at: now,
                    hours_over,
                    resolved_at: None,
                };
                tracing::info!(
                    entity = %subject.entity_type,
                    entity_id = %subject.entity_id,
                    rule = %hit.rule_name,
                    hours_over,
                    "SLA breach recorded"
                );
                self.breaches.push(breach.clone());
                report.created.push(breach);
            }

            for breach in self
                .breaches
                .iter_mut()
                .filter(|b| b.is_open() && b.entity_id == subject.entity_id)
            {
                let still_red = red
                    .iter()
                    .any(|hit| breach.same_window(subject.entity_id, &hit.rule_name, hit.expected_by));
                if !still_red {
                    breach.resolved_at = Some(now);
                    tracing::debug!(breach_id = %breach.breach_id, "SLA breach resolved");
                    report.resolved.push(breach.clone());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;
    use ws_pipeline::{
        Candidate, CandidateStatus, NewCandidate, PromotionRequest, Pursuit, PursuitStage, Signal,
        SignalSource, SignalStatus, ValueBand,
    };

    use crate::evaluator::DUE_DATE_RULE;

    fn pursuit_due(due_date: DateTime<Utc>) -> Pursuit {
        let mut c = Candidate::new(
            "org-1",
            NewCandidate {
                title: "Renewal".into(),
                value_band: ValueBand::Medium,
                contact: Default::default(),
                confidence: 50,
            },
        )
        .unwrap();
        c.transition(CandidateStatus::Triaged).unwrap();
        Pursuit::from_promotion(
            &c,
            PromotionRequest {
                title: "Renewal".into(),
                forecast_value: 80_000.0,
                due_date,
                win_probability: None,
                checklist_required: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn red_signal_creates_one_breach_per_window() {
        let dir = tempdir().unwrap();
        let mut ledger = BreachLedger::open(dir.path().join("breaches.json")).unwrap();
        let eval = SlaEvaluator::default();
        let signal = Signal::new("org-1", SignalSource::Phone, "call back", 0.9);
        let subjects = vec![SlaSubject::from(&signal)];

        let now = signal.created_at + Duration::hours(30);
        let report = ledger.sweep(&subjects, &eval, now);
        assert_eq!(report.created.len(), 1);
        let breach = &report.created[0];
        assert_eq!(breach.rule_name, "triage");
        assert!((breach.hours_over - 6.0).abs() < 1e-9);

        // Sweeping again does not duplicate.
        let again = ledger.sweep(&subjects, &eval, now + Duration::hours(1));
        assert!(again.is_empty());
        assert_eq!(ledger.open_breaches().count(), 1);
    }

    #[test]
    fn breach_resolves_when_rule_stops_applying() {
        let dir = tempdir().unwrap();
        let mut ledger = BreachLedger::open(dir.path().join("breaches.json")).unwrap();
        let eval = SlaEvaluator::default();
        let mut signal = Signal::new("org-1", SignalSource::Phone, "call back", 0.9);
        let now = signal.created_at + Duration::hours(30);

        ledger.sweep(&[SlaSubject::from(&signal)], &eval, now);
        signal.transition(SignalStatus::Triaged).unwrap();
        let report = ledger.sweep(&[SlaSubject::from(&signal)], &eval, now);

        assert_eq!(report.resolved.len(), 1);
        assert_eq!(ledger.open_breaches().count(), 0);
        assert_eq!(ledger.for_entity(signal.signal_id).count(), 1);
    }

    #[test]
    fn ledger_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("breaches.json");
        let eval = SlaEvaluator::default();
        let signal = Signal::new("org-1", SignalSource::Web, "x", 0.2);

        {
            let mut ledger = BreachLedger::open(&path).unwrap();
            ledger.sweep(
                &[SlaSubject::from(&signal)],
                &eval,
                signal.created_at + Duration::hours(48),
            );
            ledger.save().unwrap();
        }

        let ledger = BreachLedger::open(&path).unwrap();
        assert_eq!(ledger.all().len(), 1);
        assert_eq!(ledger.all()[0].entity_id, signal.signal_id);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn failed_save_keeps_previous_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("breaches.json");
        let eval = SlaEvaluator::default();
        let signal = Signal::new("org-1", SignalSource::Web, "x", 0.2);

        let mut ledger = BreachLedger::open(&path).unwrap();
        ledger.save().unwrap();
        ledger.sweep(
            &[SlaSubject::from(&signal)],
            &eval,
            signal.created_at + Duration::hours(48),
        );

        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(ledger.save().is_err());
        assert!(BreachLedger::open(&path).unwrap().all().is_empty());
    }

    #[test]
    fn overdue_pursuit_records_due_date_breach() {
        let dir = tempdir().unwrap();
        let mut ledger = BreachLedger::open(dir.path().join("breaches.json")).unwrap();
        let eval = SlaEvaluator::default();
        let now = Utc::now();
        let mut pursuit = pursuit_due(now - Duration::hours(5));

        let report = ledger.sweep(&[SlaSubject::from(&pursuit)], &eval, now);
        assert_eq!(report.created.len(), 1);
        let breach = &report.created[0];
        assert_eq!(breach.rule_name, DUE_DATE_RULE);
        assert_eq!(breach.entity_id, pursuit.pursuit_id);
        assert_eq!(breach.expected_by, pursuit.due_date);
        assert!((breach.hours_over - 5.0).abs() < 1e-6);

        // Closing the pursuit clears the window.
        pursuit.transition(PursuitStage::Lost).unwrap();
        let cleared = ledger.sweep(&[SlaSubject::from(&pursuit)], &eval, now);
        assert_eq!(cleared.resolved.len(), 1);
        assert_eq!(ledger.open_breaches().count(), 0);
    }

    #[test]
    fn green_subjects_record_nothing() {
        let dir = tempdir().unwrap();
        let mut ledger = BreachLedger::open(dir.path().join("b.json")).unwrap();
        let signal = Signal::new("org-1", SignalSource::Web, "x", 0.2);
        let report = ledger.sweep(
            &[SlaSubject::from(&signal)],
            &SlaEvaluator::default(),
            signal.created_at,
        );
        assert!(report.is_empty());
    }
}
