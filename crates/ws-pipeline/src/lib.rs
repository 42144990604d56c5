//! # ws-pipeline
//!
//! Entity model and state transition validation for Workstream.
//!
//! Inbound [`Signal`]s are triaged into [`Candidate`]s, which are promoted
//! into [`Pursuit`]s that move through a checklist-gated stage sequence.
//! Every status field has a closed transition table; every mutation writes
//! one [`WorkEvent`].
//!
//! ## Key components
//!
//! - [`Lifecycle`] — closed transition tables (signal, candidate, pursuit,
//!   proposal, drip)
//! - [`evaluate_gate`] — checklist gate for entering pink / red / submit
//! - [`Pipeline`] — validated mutations over the store, emitting events
//! - [`PipelineStore`] — JSON file-per-record persistence
//! - [`EventDispatcher`] / [`NotificationSink`] — work event fan-out
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use ws_pipeline::{Pipeline, Signal, SignalSource};
//!
//! let pipeline = Pipeline::open("/tmp/ws-store").unwrap();
//! let signal = Signal::new("org-1", SignalSource::Web, "pricing page visit", 0.8);
//! pipeline.ingest_signal(signal).unwrap();
//! ```

pub mod candidate;
pub mod checklist;
pub mod drip;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod pipeline;
pub mod proposal;
pub mod pursuit;
pub mod signal;
pub mod store;
pub mod work_event;

pub use candidate::{
    Candidate, CandidateStatus, ContactInfo, IcpBand, IcpSummary, NewCandidate, ValueBand,
};
pub use checklist::{evaluate_gate, ChecklistItem, ChecklistUpdate, GateReport};
pub use drip::{default_sequence, DripAction, DripSchedule, DripStatus, DripStep};
pub use error::PipelineError;
pub use events::{EventDispatcher, LogSink, NotificationSink};
pub use lifecycle::{check_transition, parse_status, EntityKind, Lifecycle};
pub use pipeline::Pipeline;
pub use proposal::{Proposal, ProposalStatus};
pub use pursuit::{PromotionRequest, Pursuit, PursuitOutcome, PursuitStage};
pub use signal::{Signal, SignalEnrichment, SignalSource, SignalStatus};
pub use store::{ListQuery, Page, PipelineStore, Record, RecordStore};
pub use work_event::{WorkEvent, WorkEventPayload};
