//! Normalize inbound alerts into canonical internal AlertEvent models.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::types::*;

/// Parse and normalize an InboundAlert into a canonical AlertEvent.
pub fn normalize(raw: &InboundAlert) -> Result<AlertEvent, EngineError> {
  if raw.message_id.trim().is_empty() {
    return Err(EngineError::validation("message_id", "must not be empty"));
  }
  if raw.matching_key.trim().is_empty() {
    return Err(EngineError::validation("matching_key", "must not be empty"));
  }

  let received_at = parse_rfc3339(&raw.received_at, "received_at")?;
  let started_at = parse_optional_rfc3339(raw.started_at.as_deref(), "started_at")?;
  let ended_at = parse_optional_rfc3339(raw.ended_at.as_deref(), "ended_at")?;

  let severity = Severity::from_str_loose(&raw.severity)
    .ok_or_else(|| EngineError::validation("severity", "expected minor|major|critical"))?;
  let incident_status = IncidentStatus::from_str_loose(&raw.incident_status)
    .ok_or_else(|| EngineError::validation("incident_status", "expected investigating|resolved"))?;

  Ok(AlertEvent {
    message_id: raw.message_id.trim().to_string(),
    received_at,
    title: raw.title.trim().to_string(),
    summary: raw.summary.trim().to_string(),
    severity,
    incident_status,
    update_state: raw.update_state.trim().to_string(),
    update_message: raw.update_message.trim().to_string(),
    affected_segments: normalize_segments(&raw.affected_segments),
    matching_key: raw.matching_key.trim().to_string(),
    started_at,
    ended_at,
  })
}

/// De-duplicate segments preserving first-seen order, falling back to the
/// system-wide sentinel when nothing usable remains.
pub fn normalize_segments(raw: &[String]) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for segment in raw {
    let segment = segment.trim();
    if segment.is_empty() {
      continue;
    }
    if !out.iter().any(|s| s == segment) {
      out.push(segment.to_string());
    }
  }
  if out.is_empty() {
    out.push(SYSTEM_WIDE_SEGMENT.to_string());
  }
  out
}

/// Reduce text to a filesystem- and id-safe slug: lowercase alphanumerics
/// joined by single dashes, truncated to `max_len`.
pub fn slugify(text: &str, max_len: usize) -> String {
  let mut out = String::with_capacity(text.len());
  let mut prev_dash = true;
  for ch in text.chars() {
    if ch.is_ascii_alphanumeric() {
      out.push(ch.to_ascii_lowercase());
      prev_dash = false;
    } else if !prev_dash {
      out.push('-');
      prev_dash = true;
    }
  }
  let trimmed = out.trim_end_matches('-');
  let mut slug: String = trimmed.chars().take(max_len).collect();
  if let Some(stripped) = slug.strip_suffix('-') {
    slug = stripped.to_string();
  }
  if slug.is_empty() {
    slug = "alert".to_string();
  }
  slug
}

fn parse_rfc3339(value: &str, field: &str) -> Result<DateTime<Utc>, EngineError> {
  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| EngineError::validation(field, &format!("invalid RFC3339: {}", e)))
}

fn parse_optional_rfc3339(
  value: Option<&str>,
  field: &str,
) -> Result<Option<DateTime<Utc>>, EngineError> {
  match value {
    Some(v) if !v.trim().is_empty() => parse_rfc3339(v, field).map(Some),
    _ => Ok(None),
  }
}
