//! Core state transition: fold one alert event into an incident record.
//!
//! `merge` is a pure function. Every call produces a fresh incident version
//! stamped with the event's `received_at`, whether or not any visible field
//! changed; redelivered events therefore rewrite the same snapshot instead
//! of corrupting state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::normalize::slugify;
use crate::types::{AlertEvent, Incident, IncidentStatus, IncidentUpdate};

/// Produce the next version of an incident from (previous version or none)
/// plus one event. `known_ids` is the full set of incident ids in the
/// repository, used to disambiguate newly allocated ids.
pub fn merge(
  existing: Option<&Incident>,
  event: &AlertEvent,
  known_ids: &HashSet<String>,
) -> Incident {
  let mut incident = match existing {
    Some(existing) => updated(existing, event),
    None => created(event, known_ids),
  };

  // Idempotency hinge: one update entry per source message, ever. Fields
  // above still merge on reprocessing; only the duplicate entry is
  // suppressed.
  let already_recorded = incident
    .updates
    .iter()
    .any(|u| u.source_message_id == event.message_id);
  if !already_recorded {
    incident.updates.push(IncidentUpdate {
      timestamp: event.received_at,
      state: event.update_state.clone(),
      message: event.update_message.clone(),
      source_message_id: event.message_id.clone(),
    });
    incident.updates.sort_by_key(|u| u.timestamp);
  }

  incident.version_created_at = Some(event.received_at);
  incident
}

fn created(event: &AlertEvent, known_ids: &HashSet<String>) -> Incident {
  let resolved = event.incident_status.is_resolved();
  Incident {
    id: allocate_id(event.effective_start(), &event.matching_key, known_ids),
    title: event.title.clone(),
    severity: event.severity,
    status: event.incident_status,
    started_at: event.effective_start(),
    resolved_at: resolved.then(|| event.effective_end()),
    affected_segments: event.affected_segments.clone(),
    summary: event.summary.clone(),
    updates: Vec::new(),
    matching_key: event.matching_key.clone(),
    version_created_at: None,
  }
}

fn updated(existing: &Incident, event: &AlertEvent) -> Incident {
  let mut incident = existing.clone();

  if incident.title.is_empty() {
    incident.title = event.title.clone();
  }

  for segment in &event.affected_segments {
    if !incident.affected_segments.iter().any(|s| s == segment) {
      incident.affected_segments.push(segment.clone());
    }
  }

  if !event.summary.is_empty() {
    incident.summary = event.summary.clone();
  }

  // Severity only ratchets up while open; a resolution may carry a lower
  // severity without lowering the record.
  if event.severity.rank() > incident.severity.rank() {
    incident.severity = event.severity;
  }

  if event.incident_status.is_resolved() {
    incident.status = IncidentStatus::Resolved;
    incident.resolved_at = Some(event.effective_end());
  } else if incident.status.is_resolved() {
    // Reopen under the same id.
    incident.status = IncidentStatus::Investigating;
    incident.resolved_at = None;
  } else {
    incident.status = event.incident_status;
  }

  // Tolerate out-of-order delivery: an earlier start wins.
  if let Some(event_start) = event.started_at {
    if event_start < incident.started_at {
      incident.started_at = event_start;
    }
  }

  incident
}

/// Allocate a deterministic incident id from the effective start day and the
/// grouping key, with a numeric suffix to dodge collisions.
pub fn allocate_id(
  effective_start: DateTime<Utc>,
  matching_key: &str,
  known_ids: &HashSet<String>,
) -> String {
  let base = format!(
    "inc-{}-{}",
    effective_start.format("%Y-%m-%d"),
    slugify(matching_key, 60)
  );
  if !known_ids.contains(&base) {
    return base;
  }
  let mut counter = 2;
  loop {
    let candidate = format!("{}-{}", base, counter);
    if !known_ids.contains(&candidate) {
      return candidate;
    }
    counter += 1;
  }
}
