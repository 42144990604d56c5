//! # ws-outbox
//!
//! Durable delivery queue for Workstream work events.
//!
//! Events that drive an external side effect (drip triggers) are appended to
//! a hash-chained JSONL [`Outbox`]. A worker pulls [`Outbox::due`] events,
//! attempts delivery and records the result. Failures are rescheduled with
//! exponential backoff ([`RetryPolicy`]) until the budget runs out, then
//! dead-lettered.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use ws_outbox::{Outbox, RetryPolicy};
//!
//! let outbox = Outbox::open("/tmp/outbox.jsonl", RetryPolicy::default()).unwrap();
//! for event in outbox.due(chrono::Utc::now()) {
//!     println!("{} {}", event.event_id, event.event_name);
//! }
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod outbox;
pub mod retry;
pub mod sink;

pub use entry::{OutboxEntry, OutboxRecord};
pub use error::OutboxError;
pub use outbox::{DeadLetter, FailureOutcome, Outbox};
pub use retry::RetryPolicy;
pub use sink::OutboxSink;
