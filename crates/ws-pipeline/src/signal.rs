// signal.rs — Signal: an unprocessed inbound lead.
//
// Lifecycle:
//   new → triaged → candidate_created | ignored
//   new → candidate_created | ignored  (a candidate may come from an untriaged signal)
//
// `candidate_created` is only ever entered by the pipeline when exactly one
// Candidate is created with this signal as its origin.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};

/// The channel a signal arrived on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Email,
    Phone,
    Web,
    Referral,
    Linkedin,
    Other,
}

impl SignalSource {
    pub const ALL: &'static [SignalSource] = &[
        SignalSource::Email,
        SignalSource::Phone,
        SignalSource::Web,
        SignalSource::Referral,
        SignalSource::Linkedin,
        SignalSource::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Email => "email",
            SignalSource::Phone => "phone",
            SignalSource::Web => "web",
            SignalSource::Referral => "referral",
            SignalSource::Linkedin => "linkedin",
            SignalSource::Other => "other",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalSource {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalSource::ALL
            .iter()
            .copied()
            .find(|src| src.as_str() == s.trim())
            .ok_or_else(|| PipelineError::Validation {
                field: "source",
                reason: format!("unknown signal source '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    New,
    Triaged,
    CandidateCreated,
    Ignored,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::New => "new",
            SignalStatus::Triaged => "triaged",
            SignalStatus::CandidateCreated => "candidate_created",
            SignalStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status(s)
    }
}

impl Lifecycle for SignalStatus {
    const ENTITY: EntityKind = EntityKind::Signal;
    const ALL: &'static [Self] = &[
        SignalStatus::New,
        SignalStatus::Triaged,
        SignalStatus::CandidateCreated,
        SignalStatus::Ignored,
    ];

    fn targets(self) -> &'static [Self] {
        match self {
            SignalStatus::New => &[
                SignalStatus::Triaged,
                SignalStatus::CandidateCreated,
                SignalStatus::Ignored,
            ],
            SignalStatus::Triaged => &[SignalStatus::CandidateCreated, SignalStatus::Ignored],
            SignalStatus::CandidateCreated | SignalStatus::Ignored => &[],
        }
    }
}

/// A raw inbound lead indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: Uuid,

    /// Owning organization.
    pub org_id: String,

    pub source: SignalSource,

    /// Free-text excerpt of the inbound message.
    pub snippet: String,

    /// Urgency estimate, 0.0–1.0.
    pub urgency_score: f64,

    /// Signals describing the same real-world event share a cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<u32>,

    pub status: SignalStatus,

    /// Resolved contact identity (set by enrichment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,

    /// Resolved client identity (set by enrichment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Signal {
    /// Create a new signal in the `new` state. Urgency is clamped to 0.0–1.0.
    pub fn new(
        org_id: impl Into<String>,
        source: SignalSource,
        snippet: impl Into<String>,
        urgency_score: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            signal_id: Uuid::new_v4(),
            org_id: org_id.into(),
            source,
            snippet: snippet.into(),
            urgency_score: clamp_unit(urgency_score),
            cluster_id: None,
            cluster_count: None,
            status: SignalStatus::New,
            contact_id: None,
            client_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status. Returns an error if the transition is invalid.
    pub fn transition(&mut self, to: SignalStatus) -> Result<(), PipelineError> {
        self.status = check_transition(self.signal_id, self.status, to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record identity-resolution and clustering results.
    pub fn record_enrichment(&mut self, enrichment: SignalEnrichment) {
        if enrichment.contact_id.is_some() {
            self.contact_id = enrichment.contact_id;
        }
        if enrichment.client_id.is_some() {
            self.client_id = enrichment.client_id;
        }
        if enrichment.cluster_id.is_some() {
            self.cluster_id = enrichment.cluster_id;
            self.cluster_count = enrichment.cluster_count;
        }
        if let Some(urgency) = enrichment.urgency_score {
            self.urgency_score = clamp_unit(urgency);
        }
        self.updated_at = Utc::now();
    }
}

/// Output of an external enrichment/analysis pass. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalEnrichment {
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub cluster_count: Option<u32>,
    #[serde(default)]
    pub urgency_score: Option<f64>,
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_signal_starts_new_with_clamped_urgency() {
        let s = Signal::new("org-1", SignalSource::Email, "need 3 java devs", 1.7);
        assert_eq!(s.status, SignalStatus::New);
        assert_eq!(s.urgency_score, 1.0);

        let s = Signal::new("org-1", SignalSource::Web, "hello", f64::NAN);
        assert_eq!(s.urgency_score, 0.0);
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [SignalStatus::CandidateCreated, SignalStatus::Ignored] {
            for target in SignalStatus::ALL {
                assert!(!terminal.can_transition_to(*target));
            }
        }
    }

    #[test]
    fn triaged_cannot_go_back_to_new() {
        let mut s = Signal::new("org-1", SignalSource::Phone, "call back", 0.4);
        s.transition(SignalStatus::Triaged).unwrap();
        let err = s.transition(SignalStatus::New).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(s.status, SignalStatus::Triaged);
    }

    #[test]
    fn enrichment_only_overwrites_present_fields() {
        let mut s = Signal::new("org-1", SignalSource::Linkedin, "intro", 0.2);
        s.contact_id = Some("contact-1".into());
        s.record_enrichment(SignalEnrichment {
            client_id: Some("acme".into()),
            cluster_id: Some("cl-9".into()),
            cluster_count: Some(3),
            ..Default::default()
        });
        assert_eq!(s.contact_id.as_deref(), Some("contact-1"));
        assert_eq!(s.client_id.as_deref(), Some("acme"));
        assert_eq!(s.cluster_count, Some(3));
    }

    #[test]
    fn source_parses_from_str() {
        assert_eq!("referral".parse::<SignalSource>().unwrap(), SignalSource::Referral);
        assert!("fax".parse::<SignalSource>().is_err());
    }
}
