//! # ws-sla
//!
//! SLA evaluation for Workstream.
//!
//! Every open entity is measured against the rule for its current status
//! (`expected_by = anchor + threshold`) and gets a traffic-light
//! [`SlaBadge`]. Red windows are recorded once in the [`BreachLedger`] and
//! resolved when the window clears.

pub mod badge;
pub mod breach;
pub mod error;
pub mod evaluator;
pub mod rule;

pub use badge::{evaluate, evaluate_default, SlaBadge, DEFAULT_AMBER_WINDOW_HOURS};
pub use breach::{BreachLedger, SlaBreach, SweepReport};
pub use error::SlaError;
pub use evaluator::{Assessment, RuleAssessment, SlaEvaluator, DUE_DATE_RULE};
pub use rule::{default_rules, SlaAnchor, SlaRule, SlaSubject};
