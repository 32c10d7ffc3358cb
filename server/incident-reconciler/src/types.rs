//! Core types for the reconciliation engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema tag written into every snapshot envelope.
pub const SNAPSHOT_SCHEMA: &str = "incident-snapshot-v1";

/// Sentinel segment used when an event names no affected segments.
pub const SYSTEM_WIDE_SEGMENT: &str = "System-wide";

// ---------------------------------------------------------------------------
// Inbound types (JSON contract — what the normalizer collaborator sends)
// ---------------------------------------------------------------------------

/// One inbound normalized alert line from stdin. Unknown fields are silently
/// ignored; timestamps arrive as RFC3339 strings and are validated in
/// `normalize`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundAlert {
  pub message_id: String,
  pub received_at: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub summary: String,
  pub severity: String,
  pub incident_status: String,
  #[serde(default)]
  pub update_state: String,
  #[serde(default)]
  pub update_message: String,
  #[serde(default)]
  pub affected_segments: Vec<String>,
  pub matching_key: String,
  #[serde(default)]
  pub started_at: Option<String>,
  #[serde(default)]
  pub ended_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Severity / status enums (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  /// Old snapshots may carry the status-page word instead of the severity.
  #[serde(alias = "degraded")]
  Minor,
  Major,
  Critical,
}

impl Severity {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "minor" | "degraded" => Some(Self::Minor),
      "major" => Some(Self::Major),
      "critical" => Some(Self::Critical),
      _ => None,
    }
  }

  /// Rank used for monotonicity and rollup comparisons
  /// (operational would be 0; it never occurs on an incident).
  pub fn rank(self) -> u8 {
    match self {
      Self::Minor => 1,
      Self::Major => 2,
      Self::Critical => 3,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
  Investigating,
  Resolved,
}

impl IncidentStatus {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "investigating" => Some(Self::Investigating),
      "resolved" => Some(Self::Resolved),
      _ => None,
    }
  }

  pub fn is_resolved(self) -> bool {
    matches!(self, Self::Resolved)
  }
}

/// System-wide rollup status derived from the active incident set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
  Operational,
  Degraded,
  Major,
  Critical,
}

// ---------------------------------------------------------------------------
// Internal normalized event
// ---------------------------------------------------------------------------

/// Canonical internal event after normalization + validation.
#[derive(Debug, Clone)]
pub struct AlertEvent {
  pub message_id: String,
  pub received_at: DateTime<Utc>,
  pub title: String,
  pub summary: String,
  pub severity: Severity,
  pub incident_status: IncidentStatus,
  pub update_state: String,
  pub update_message: String,
  /// De-duplicated, first-seen order, never empty.
  pub affected_segments: Vec<String>,
  pub matching_key: String,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
  /// The start the incident should carry if this event opens it.
  pub fn effective_start(&self) -> DateTime<Utc> {
    self.started_at.unwrap_or(self.received_at)
  }

  /// The resolution timestamp this event implies.
  pub fn effective_end(&self) -> DateTime<Utc> {
    self.ended_at.unwrap_or(self.received_at)
  }
}

// ---------------------------------------------------------------------------
// Incident model (persisted inside snapshots)
// ---------------------------------------------------------------------------

/// One append-only update entry inside an incident. `source_message_id` is
/// unique within an incident's update list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdate {
  pub timestamp: DateTime<Utc>,
  pub state: String,
  pub message: String,
  pub source_message_id: String,
}

/// A logical incident: one per `id`, latest version wins on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
  pub id: String,
  pub title: String,
  pub severity: Severity,
  pub status: IncidentStatus,
  pub started_at: DateTime<Utc>,
  pub resolved_at: Option<DateTime<Utc>>,
  pub affected_segments: Vec<String>,
  pub summary: String,
  #[serde(default)]
  pub updates: Vec<IncidentUpdate>,
  pub matching_key: String,
  /// Logical version number: timestamp of the event that produced this
  /// version. Absent only in legacy records.
  #[serde(default)]
  pub version_created_at: Option<DateTime<Utc>>,
}

impl Incident {
  /// Version key used by reconstruction: `version_created_at`, falling back
  /// to the last update timestamp, then `resolved_at`, then `started_at`.
  pub fn version_key(&self) -> DateTime<Utc> {
    self
      .version_created_at
      .or_else(|| self.updates.last().map(|u| u.timestamp))
      .or(self.resolved_at)
      .unwrap_or(self.started_at)
  }
}

// ---------------------------------------------------------------------------
// Persisted envelopes
// ---------------------------------------------------------------------------

/// One immutable snapshot file: an incident version plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub schema: String,
  pub version_created_at: DateTime<Utc>,
  pub source_message_id: String,
  pub incident: Incident,
}

impl Snapshot {
  pub fn new(incident: Incident, event: &AlertEvent) -> Self {
    Self {
      schema: SNAPSHOT_SCHEMA.to_string(),
      version_created_at: event.received_at,
      source_message_id: event.message_id.clone(),
      incident,
    }
  }
}

/// The single mutable status file: rollup + cumulative snapshot pointer list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStatusSummary {
  pub service_name: String,
  pub overall_status: OverallStatus,
  pub status_message: String,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub active_incident_ids: Vec<String>,
  #[serde(default)]
  pub snapshot_paths: Vec<String>,
}

/// Dedup ledger: bounded record of already-applied message ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionState {
  #[serde(default)]
  pub processed_message_ids: Vec<String>,
  #[serde(default)]
  pub last_run_at: Option<DateTime<Utc>>,
}

/// Legacy read-only snapshot index; unioned into reconstruction, never
/// written by new code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyIndex {
  #[serde(default)]
  pub files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what we emit, one line per event)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutput {
  Applied {
    message_id: String,
    incident_id: String,
    status: IncidentStatus,
    snapshot_path: String,
  },
  Duplicate {
    message_id: String,
  },
}

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
