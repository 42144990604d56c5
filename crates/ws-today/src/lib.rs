//! # ws-today
//!
//! The Today panel for Workstream: one ranked list of signals, candidates
//! and pursuits needing attention.
//!
//! - [`WorkItem`] — the shared item shape, tolerant of missing fields
//! - [`rank`] — dead-band score banding, then tier, SLA badge, position
//! - [`is_ready_to_promote`] — high-ICP candidates above the score threshold
//! - [`build_panel`] — filter, rank, group by tier and count
//! - [`Projector`] — derive items from local pipeline records
//! - [`WorkstreamStats`] — headline counts and forecast

pub mod error;
pub mod item;
pub mod panel;
pub mod priority;
pub mod project;
pub mod stats;

pub use error::TodayError;
pub use item::{ItemKind, PriorityTier, WorkItem};
pub use panel::{build_panel, KindFilter, PanelFilter, PanelView, TierCounts, TierFilter, TierGroup};
pub use priority::{is_ready_to_promote, rank, PriorityConfig};
pub use project::{candidate_score, Projector};
pub use stats::WorkstreamStats;
