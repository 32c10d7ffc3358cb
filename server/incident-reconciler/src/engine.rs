//! Ingestion coordinator: drives one event at a time through matching,
//! merging, and persistence, and recomputes the status summary once per
//! dirty batch.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::aggregator;
use crate::config::Config;
use crate::error::EngineError;
use crate::matcher;
use crate::merger;
use crate::normalize;
use crate::repository;
use crate::store::Store;
use crate::types::*;

/// Result of applying one inbound alert.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
  /// Merged and persisted as a new incident version.
  Applied {
    incident: Incident,
    snapshot_path: String,
  },
  /// Message id already in the ledger; nothing was touched. The caller
  /// still acknowledges delivery upstream.
  Duplicate,
}

/// The reconciliation engine. Holds the dedup ledger and dirty flag across
/// a batch; all incident state lives in the store.
pub struct Engine {
  config: Config,
  store: Store,
  state: IngestionState,
  processed: HashSet<String>,
  dirty: bool,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    let store = Store::new(config.clone());
    let state = store.load_ingestion_state();
    let processed = state.processed_message_ids.iter().cloned().collect();
    Self {
      config,
      store,
      state,
      processed,
      dirty: false,
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn store(&self) -> &Store {
    &self.store
  }

  /// Process a single inbound alert: validate, dedup, match, merge, persist.
  pub fn apply(&mut self, raw: &InboundAlert) -> Result<ApplyOutcome, EngineError> {
    let event = normalize::normalize(raw)?;

    if self.processed.contains(&event.message_id) {
      debug!(message_id = %event.message_id, "duplicate event, skipping");
      return Ok(ApplyOutcome::Duplicate);
    }

    let incidents = repository::reconstruct(&self.store);
    let known_ids: HashSet<String> = incidents.iter().map(|i| i.id.clone()).collect();
    let matched = matcher::find_match(&incidents, &event);
    let incident = merger::merge(matched, &event, &known_ids);
    let snapshot_path = self.store.persist_snapshot(&incident, &event)?;

    self.processed.insert(event.message_id.clone());
    self.state.processed_message_ids.push(event.message_id.clone());
    self.dirty = true;

    info!(
      message_id = %event.message_id,
      incident_id = %incident.id,
      status = ?incident.status,
      "event applied"
    );
    Ok(ApplyOutcome::Applied {
      incident,
      snapshot_path,
    })
  }

  /// Close out a batch: persist the ledger, and if any event was applied,
  /// recompute the status summary exactly once.
  pub fn finish_batch(
    &mut self,
    now: DateTime<Utc>,
  ) -> Result<Option<CurrentStatusSummary>, EngineError> {
    self.store.save_ingestion_state(&mut self.state, now)?;
    if !self.dirty {
      return Ok(None);
    }
    let summary = aggregator::recompute(&self.store, &self.config, now)?;
    self.dirty = false;
    Ok(Some(summary))
  }
}
