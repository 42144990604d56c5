//! # ws-client
//!
//! The async face of Workstream.
//!
//! - [`WorkstreamApi`] — the collaborator contract (list, fetch, transition,
//!   promote, checklist, drip, panel, stats)
//! - [`LocalApi`] — the collaborator backed by the local JSON store, event
//!   log, breach ledger and outbox
//! - [`CommandLayer`] — per-entity serialized commands with local
//!   transition checks and stale-read recovery
//! - [`PanelFeed`] — last-request-wins Today panel refresh
//! - [`OutboxWorker`] — delivers queued drip requests through a
//!   [`DripProvider`] with retry and dead-lettering
//! - [`WorkstreamConfig`] / [`WorkstreamPaths`] — `workstream.toml` and the
//!   `.ws/` project layout

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod feed;
pub mod local;
pub mod worker;

pub use api::{DripAck, DripProvider, LogDripProvider, WorkstreamApi};
pub use command::CommandLayer;
pub use config::{DripConfig, SlaConfig, WorkstreamConfig, WorkstreamPaths};
pub use error::ClientError;
pub use feed::PanelFeed;
pub use local::LocalApi;
pub use worker::{OutboxWorker, WorkerReport};
