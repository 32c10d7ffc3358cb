//! Incident Reconciliation Engine — deterministic, rule-based.
//!
//! Ingests normalized service-alert events one at a time, decides whether
//! each one opens, continues, or closes an incident, merges its fields into
//! the incident record, persists an immutable versioned snapshot, and
//! recomputes the system-wide status rollup.
//!
//! Correct under at-least-once delivery (dedup ledger + idempotent merge),
//! partial or conflicting information (documented merge and tie-break
//! rules), and a store made of immutable snapshot files plus one mutable
//! pointer file. No DB, no network; pure computation + JSON files.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod merger;
pub mod normalize;
pub mod repository;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::{ApplyOutcome, Engine};
pub use error::EngineError;
pub use types::{CurrentStatusSummary, InboundAlert, Incident};
