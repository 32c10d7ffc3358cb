//! Reconstruct the latest version of every incident from the snapshot set.

use std::collections::HashMap;

use crate::store::Store;
use crate::types::Incident;

/// Load every snapshot the pointer list (and the legacy index) references
/// and keep, per incident id, the version with the greatest version key.
/// Exact ties go to the record read later, i.e. most recently appended.
/// Returns incidents newest `started_at` first. Read-only and idempotent.
pub fn reconstruct(store: &Store) -> Vec<Incident> {
  let mut paths = store.load_summary().snapshot_paths;
  paths.extend(store.load_legacy_index_paths());

  let mut seen = std::collections::HashSet::new();
  let mut by_id: HashMap<String, Incident> = HashMap::new();
  for rel in paths {
    if !seen.insert(rel.clone()) {
      continue;
    }
    for incident in store.load_incident_records(&rel) {
      if incident.id.is_empty() {
        continue;
      }
      match by_id.get(&incident.id) {
        Some(prev) if incident.version_key() < prev.version_key() => {}
        _ => {
          by_id.insert(incident.id.clone(), incident);
        }
      }
    }
  }

  let mut incidents: Vec<Incident> = by_id.into_values().collect();
  incidents.sort_by(|a, b| b.started_at.cmp(&a.started_at));
  incidents
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::store::LEGACY_INDEX_FILE;
  use crate::types::{IncidentStatus, Severity, Snapshot, SNAPSHOT_SCHEMA};
  use chrono::{DateTime, Utc};
  use std::fs;
  use tempfile::TempDir;

  fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
  }

  fn make_incident(id: &str, started: &str, version: &str) -> Incident {
    Incident {
      id: id.into(),
      title: format!("Incident {}", id),
      severity: Severity::Minor,
      status: IncidentStatus::Investigating,
      started_at: ts(started),
      resolved_at: None,
      affected_segments: vec!["Northbound".into()],
      summary: String::new(),
      updates: vec![],
      matching_key: id.into(),
      version_created_at: Some(ts(version)),
    }
  }

  fn write_snapshot(tmp: &TempDir, rel: &str, incident: &Incident) {
    let snapshot = Snapshot {
      schema: SNAPSHOT_SCHEMA.to_string(),
      version_created_at: incident.version_created_at.unwrap_or(incident.started_at),
      source_message_id: format!("src-{}", rel),
      incident: incident.clone(),
    };
    let path = tmp.path().join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec(&snapshot).unwrap()).unwrap();
  }

  fn store_with_pointers(tmp: &TempDir, paths: &[&str]) -> Store {
    let store = Store::new(Config {
      data_dir: tmp.path().to_path_buf(),
      ..Config::default()
    });
    let mut summary = store.load_summary();
    summary.snapshot_paths = paths.iter().map(|p| p.to_string()).collect();
    store.save_summary(&summary).unwrap();
    store
  }

  #[test]
  fn latest_version_wins_regardless_of_read_order() {
    let v1 = make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T08:00:00Z");
    let mut v2 = make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T09:00:00Z");
    v2.severity = Severity::Major;

    for order in [["s1.json", "s2.json"], ["s2.json", "s1.json"]] {
      let tmp = TempDir::new().unwrap();
      write_snapshot(&tmp, "s1.json", &v1);
      write_snapshot(&tmp, "s2.json", &v2);
      let store = store_with_pointers(&tmp, &order);

      let incidents = reconstruct(&store);
      assert_eq!(incidents.len(), 1);
      assert_eq!(incidents[0].severity, Severity::Major);
    }
  }

  #[test]
  fn corrupt_snapshot_is_skipped() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(
      &tmp,
      "good.json",
      &make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T08:00:00Z"),
    );
    fs::write(tmp.path().join("bad.json"), b"%%%%").unwrap();
    let store = store_with_pointers(&tmp, &["bad.json", "good.json"]);

    let incidents = reconstruct(&store);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].id, "inc-a");
  }

  #[test]
  fn legacy_index_paths_are_unioned() {
    let tmp = TempDir::new().unwrap();
    write_snapshot(
      &tmp,
      "current.json",
      &make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T08:00:00Z"),
    );
    write_snapshot(
      &tmp,
      "legacy.json",
      &make_incident("inc-b", "2025-03-09T08:00:00Z", "2025-03-09T08:00:00Z"),
    );
    fs::create_dir_all(tmp.path().join("incidents")).unwrap();
    fs::write(
      tmp.path().join(LEGACY_INDEX_FILE),
      br#"{"files": ["legacy.json"]}"#,
    )
    .unwrap();
    let store = store_with_pointers(&tmp, &["current.json"]);

    let incidents = reconstruct(&store);
    assert_eq!(incidents.len(), 2);
    // Newest started_at first.
    assert_eq!(incidents[0].id, "inc-a");
    assert_eq!(incidents[1].id, "inc-b");
  }

  #[test]
  fn legacy_record_without_version_falls_back_to_update_timestamp() {
    let tmp = TempDir::new().unwrap();
    let mut old = make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T08:00:00Z");
    old.version_created_at = None;
    old.updates.push(crate::types::IncidentUpdate {
      timestamp: ts("2025-03-10T10:00:00Z"),
      state: "degraded".into(),
      message: "later".into(),
      source_message_id: "m-late".into(),
    });
    let newer_looking = make_incident("inc-a", "2025-03-10T08:00:00Z", "2025-03-10T09:00:00Z");
    write_snapshot(&tmp, "old.json", &old);
    write_snapshot(&tmp, "new.json", &newer_looking);
    let store = store_with_pointers(&tmp, &["old.json", "new.json"]);

    // The record without version_created_at ranks by its last update (10:00),
    // which beats the explicit 09:00 version.
    let incidents = reconstruct(&store);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].updates.len(), 1);
  }
}
