//! Recompute the single current-status summary from the full incident set.
//!
//! The summary is always rebuilt from authoritative state, never patched
//! incrementally, so it cannot drift from the underlying incidents.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Config;
use crate::error::EngineError;
use crate::repository;
use crate::store::Store;
use crate::types::{CurrentStatusSummary, Incident, OverallStatus, Severity};

/// Reconstruct all incidents, derive the rollup, and write the summary file.
pub fn recompute(
  store: &Store,
  config: &Config,
  updated_at: DateTime<Utc>,
) -> Result<CurrentStatusSummary, EngineError> {
  let incidents = repository::reconstruct(store);
  let previous = store.load_summary();
  let summary = summarize(&incidents, previous, config, updated_at);
  store.save_summary(&summary)?;
  debug!(
    overall = ?summary.overall_status,
    active = summary.active_incident_ids.len(),
    "status summary recomputed"
  );
  Ok(summary)
}

/// Pure rollup: derive the next summary from the reconstructed incident set
/// and the previous summary (whose service name and cumulative pointer list
/// are preserved).
pub fn summarize(
  incidents: &[Incident],
  previous: CurrentStatusSummary,
  config: &Config,
  updated_at: DateTime<Utc>,
) -> CurrentStatusSummary {
  let mut active: Vec<&Incident> = incidents.iter().filter(|i| !i.status.is_resolved()).collect();
  active.sort_by(|a, b| {
    b.severity
      .rank()
      .cmp(&a.severity.rank())
      .then(b.started_at.cmp(&a.started_at))
  });

  let mut summary = previous;
  if summary.service_name.is_empty() {
    summary.service_name = config.service_name.clone();
  }
  summary.updated_at = updated_at;

  match active.first() {
    Some(top) => {
      summary.overall_status = match top.severity {
        Severity::Critical => OverallStatus::Critical,
        Severity::Major => OverallStatus::Major,
        Severity::Minor => OverallStatus::Degraded,
      };
      summary.status_message = if !top.summary.is_empty() {
        top.summary.clone()
      } else if !top.title.is_empty() {
        top.title.clone()
      } else {
        "Active incident".to_string()
      };
      summary.active_incident_ids = active.iter().map(|i| i.id.clone()).collect();
    }
    None => {
      summary.overall_status = OverallStatus::Operational;
      summary.status_message = config.idle_message.clone();
      summary.active_incident_ids = Vec::new();
    }
  }
  summary
}
