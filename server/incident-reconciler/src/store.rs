//! File-backed persistence: immutable snapshots plus the mutable pointer,
//! ledger, and status files under one data directory.
//!
//! Snapshot paths are deterministic from (received day, matching key,
//! message id), so redelivery overwrites the same file instead of growing a
//! duplicate. Mutable files are written whole-file via tmp + rename so a
//! reader never observes a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::Config;
use crate::error::EngineError;
use crate::normalize::slugify;
use crate::types::*;

pub const CURRENT_STATUS_FILE: &str = "current-status.json";
pub const LEGACY_INDEX_FILE: &str = "incidents/index.json";
pub const INGESTION_STATE_FILE: &str = "ingestion-state.json";
pub const SNAPSHOT_DIR: &str = "incidents/events";

/// Handle on the data directory. All paths in pointer lists are relative to
/// the root so the directory can be relocated wholesale.
pub struct Store {
  config: Config,
}

impl Store {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn root(&self) -> &Path {
    &self.config.data_dir
  }

  fn abs(&self, rel: &str) -> PathBuf {
    self.config.data_dir.join(rel)
  }

  // -------------------------------------------------------------------------
  // Snapshots
  // -------------------------------------------------------------------------

  /// Relative snapshot path for the event:
  /// `incidents/events/YYYY/MM/DD/<stamp>-<key>-<msg>.json`.
  pub fn snapshot_rel_path(event: &AlertEvent) -> String {
    let day = event.received_at.format("%Y/%m/%d");
    let stamp = event.received_at.format("%Y%m%dT%H%M%S");
    let key = slugify(&event.matching_key, 32);
    let msg = slugify(&event.message_id, 24);
    format!("{}/{}/{}-{}-{}.json", SNAPSHOT_DIR, day, stamp, key, msg)
  }

  /// Write one snapshot and append its path to the summary pointer list.
  /// Returns the relative snapshot path.
  pub fn persist_snapshot(
    &self,
    incident: &Incident,
    event: &AlertEvent,
  ) -> Result<String, EngineError> {
    let rel = Self::snapshot_rel_path(event);
    let snapshot = Snapshot::new(incident.clone(), event);
    self.write_json(&rel, &snapshot)?;

    let mut summary = self.load_summary();
    if !summary.snapshot_paths.iter().any(|p| p == &rel) {
      summary.snapshot_paths.push(rel.clone());
    }
    self.save_summary(&summary)?;
    Ok(rel)
  }

  /// Load the incident records a pointer entry refers to. Tolerates three
  /// payload shapes: the snapshot envelope, a bare incident object, and the
  /// legacy batch form `{items: [..]}`. Corrupt or alien files yield an
  /// empty list, never an error.
  pub fn load_incident_records(&self, rel: &str) -> Vec<Incident> {
    let value: serde_json::Value = match self.read_json(rel) {
      Some(v) => v,
      None => return Vec::new(),
    };

    if let Some(items) = value.get("items").and_then(|v| v.as_array()) {
      return items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();
    }
    if let Some(incident) = value.get("incident") {
      return serde_json::from_value(incident.clone()).into_iter().collect();
    }
    if value.get("id").is_some() {
      return serde_json::from_value(value).into_iter().collect();
    }
    warn!(path = rel, "skipping snapshot with unrecognized shape");
    Vec::new()
  }

  // -------------------------------------------------------------------------
  // Summary / legacy index
  // -------------------------------------------------------------------------

  /// Load the status summary, or a fresh operational one if the file is
  /// missing or unreadable.
  pub fn load_summary(&self) -> CurrentStatusSummary {
    self
      .read_json(CURRENT_STATUS_FILE)
      .unwrap_or_else(|| CurrentStatusSummary {
        service_name: self.config.service_name.clone(),
        overall_status: OverallStatus::Operational,
        status_message: self.config.idle_message.clone(),
        updated_at: Utc::now(),
        active_incident_ids: Vec::new(),
        snapshot_paths: Vec::new(),
      })
  }

  pub fn save_summary(&self, summary: &CurrentStatusSummary) -> Result<(), EngineError> {
    let mut summary = summary.clone();
    summary.snapshot_paths = dedup_preserving_order(summary.snapshot_paths);
    self.write_json(CURRENT_STATUS_FILE, &summary)
  }

  /// Paths from the legacy index file. Read-only compatibility input; new
  /// code never writes it.
  pub fn load_legacy_index_paths(&self) -> Vec<String> {
    self
      .read_json::<LegacyIndex>(LEGACY_INDEX_FILE)
      .map(|index| index.files)
      .unwrap_or_default()
  }

  // -------------------------------------------------------------------------
  // Dedup ledger
  // -------------------------------------------------------------------------

  pub fn load_ingestion_state(&self) -> IngestionState {
    self.read_json(INGESTION_STATE_FILE).unwrap_or_default()
  }

  /// Persist the ledger: duplicates removed, bounded to the configured
  /// capacity (oldest dropped first), `last_run_at` stamped.
  pub fn save_ingestion_state(
    &self,
    state: &mut IngestionState,
    now: DateTime<Utc>,
  ) -> Result<(), EngineError> {
    let mut ids = dedup_preserving_order(std::mem::take(&mut state.processed_message_ids));
    if ids.len() > self.config.ledger_capacity {
      ids.drain(..ids.len() - self.config.ledger_capacity);
    }
    state.processed_message_ids = ids;
    state.last_run_at = Some(now);
    self.write_json(INGESTION_STATE_FILE, state)
  }

  // -------------------------------------------------------------------------
  // JSON file plumbing
  // -------------------------------------------------------------------------

  fn read_json<T: serde::de::DeserializeOwned>(&self, rel: &str) -> Option<T> {
    let path = self.abs(rel);
    let bytes = fs::read(&path).ok()?;
    match serde_json::from_slice(&bytes) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(path = rel, error = %e, "skipping unreadable JSON file");
        None
      }
    }
  }

  /// Whole-file write: serialize, write to a sibling tmp file, fsync, rename.
  fn write_json<T: serde::Serialize>(&self, rel: &str, value: &T) -> Result<(), EngineError> {
    let path = self.abs(rel);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|e| EngineError::io(parent.display().to_string(), e))?;
    }

    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    {
      let mut file =
        File::create(&tmp).map_err(|e| EngineError::io(tmp.display().to_string(), e))?;
      file
        .write_all(&data)
        .map_err(|e| EngineError::io(tmp.display().to_string(), e))?;
      file
        .sync_all()
        .map_err(|e| EngineError::io(tmp.display().to_string(), e))?;
    }
    fs::rename(&tmp, &path).map_err(|e| EngineError::io(path.display().to_string(), e))
  }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
