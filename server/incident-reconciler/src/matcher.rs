//! Match an incoming alert event to the incident it belongs to.
//!
//! Matching is heuristic: an incident is a candidate when its grouping key
//! equals the event's, or when the normalized titles agree (defense against
//! key-derivation drift between normalizer versions). Tie-breaks are
//! deterministic so ambiguity never surfaces as an error.

use crate::types::{AlertEvent, Incident};

/// Find the best existing incident for `event`, or `None` to open a new one.
///
/// Candidates are ranked newest `started_at` first. A resolution event
/// prefers the most recent open candidate, so it closes the live incident
/// rather than a stale one; with no open candidate it falls back to the most
/// recent candidate overall (late or duplicate resolution). A non-resolution
/// event does the same, reopening the most recent resolved candidate rather
/// than spawning a duplicate incident under an identical key.
pub fn find_match<'a>(incidents: &'a [Incident], event: &AlertEvent) -> Option<&'a Incident> {
  let event_title = normalize_title(&event.title);
  let mut candidates: Vec<&Incident> = incidents
    .iter()
    .filter(|incident| {
      incident.matching_key == event.matching_key
        || (!event_title.is_empty() && normalize_title(&incident.title) == event_title)
    })
    .collect();
  if candidates.is_empty() {
    return None;
  }
  candidates.sort_by(|a, b| b.started_at.cmp(&a.started_at));

  // Both the resolution and non-resolution policies reduce to the same
  // selection: newest open candidate, else newest candidate overall.
  candidates
    .iter()
    .find(|i| !i.status.is_resolved())
    .copied()
    .or_else(|| candidates.first().copied())
}

/// Normalize a title for drift-tolerant comparison: strip reply/forward
/// prefixes and alerting noise words, drop punctuation, collapse whitespace,
/// lowercase.
pub fn normalize_title(title: &str) -> String {
  let mut s = title.trim().to_ascii_lowercase();
  loop {
    let mut stripped = false;
    for prefix in ["re:", "fw:", "fwd:"] {
      if let Some(rest) = s.strip_prefix(prefix) {
        s = rest.trim_start().to_string();
        stripped = true;
      }
    }
    if !stripped {
      break;
    }
  }

  let spaced: String = s
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
    .collect();

  let tokens: Vec<&str> = spaced.split_whitespace().collect();
  let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
  let mut i = 0;
  while i < tokens.len() {
    match tokens[i] {
      "alert" | "advisory" | "notification" => {}
      "service" if tokens.get(i + 1) == Some(&"update") => {
        i += 1;
      }
      token => kept.push(token),
    }
    i += 1;
  }
  kept.join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{IncidentStatus, Severity};
  use chrono::{DateTime, Utc};

  fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
  }

  fn make_incident(id: &str, key: &str, started: &str, status: IncidentStatus) -> Incident {
    Incident {
      id: id.into(),
      title: format!("Delay on {}", key),
      severity: Severity::Minor,
      status,
      started_at: ts(started),
      resolved_at: None,
      affected_segments: vec!["Northbound".into()],
      summary: String::new(),
      updates: vec![],
      matching_key: key.into(),
      version_created_at: Some(ts(started)),
    }
  }

  fn make_event(key: &str, status: IncidentStatus) -> AlertEvent {
    AlertEvent {
      message_id: "<m@x>".into(),
      received_at: ts("2025-03-10T12:00:00Z"),
      title: String::new(),
      summary: String::new(),
      severity: Severity::Minor,
      incident_status: status,
      update_state: "degraded".into(),
      update_message: "update".into(),
      affected_segments: vec!["Northbound".into()],
      matching_key: key.into(),
      started_at: None,
      ended_at: None,
    }
  }

  #[test]
  fn no_candidates_means_no_match() {
    let incidents = vec![make_incident("a", "key-a", "2025-03-10T08:00:00Z", IncidentStatus::Investigating)];
    let event = make_event("key-b", IncidentStatus::Investigating);
    assert!(find_match(&incidents, &event).is_none());
  }

  #[test]
  fn matches_by_key() {
    let incidents = vec![make_incident("a", "key-a", "2025-03-10T08:00:00Z", IncidentStatus::Investigating)];
    let event = make_event("key-a", IncidentStatus::Investigating);
    assert_eq!(find_match(&incidents, &event).unwrap().id, "a");
  }

  #[test]
  fn matches_by_normalized_title_when_key_drifts() {
    let mut incident = make_incident("a", "key-old", "2025-03-10T08:00:00Z", IncidentStatus::Investigating);
    incident.title = "Alert: Signal issue at Palo Alto".into();
    let mut event = make_event("key-new", IncidentStatus::Investigating);
    event.title = "Re: Signal issue at Palo Alto.".into();
    assert_eq!(find_match(&[incident], &event).unwrap().id, "a");
  }

  #[test]
  fn resolution_prefers_most_recent_open_candidate() {
    let incidents = vec![
      make_incident("stale", "key-a", "2025-03-09T08:00:00Z", IncidentStatus::Investigating),
      make_incident("live", "key-a", "2025-03-10T08:00:00Z", IncidentStatus::Investigating),
      {
        let mut i = make_incident("closed", "key-a", "2025-03-10T10:00:00Z", IncidentStatus::Resolved);
        i.resolved_at = Some(ts("2025-03-10T11:00:00Z"));
        i
      },
    ];
    let event = make_event("key-a", IncidentStatus::Resolved);
    assert_eq!(find_match(&incidents, &event).unwrap().id, "live");
  }

  #[test]
  fn all_resolved_falls_back_to_most_recent() {
    let mut older = make_incident("old", "key-a", "2025-03-08T08:00:00Z", IncidentStatus::Resolved);
    older.resolved_at = Some(ts("2025-03-08T09:00:00Z"));
    let mut newer = make_incident("new", "key-a", "2025-03-10T08:00:00Z", IncidentStatus::Resolved);
    newer.resolved_at = Some(ts("2025-03-10T09:00:00Z"));
    let incidents = vec![older, newer];
    let event = make_event("key-a", IncidentStatus::Investigating);
    assert_eq!(find_match(&incidents, &event).unwrap().id, "new");
  }

  #[test]
  fn normalize_title_strips_noise() {
    assert_eq!(
      normalize_title("Fwd: Re: Service Update: Delay at Hillsdale!"),
      "delay at hillsdale"
    );
    assert_eq!(normalize_title("Advisory — track work"), "track work");
  }
}
