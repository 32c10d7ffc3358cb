//! Engine configuration with sane defaults.

use std::path::PathBuf;

/// Tunables for the reconciliation pipeline.
#[derive(Debug, Clone)]
pub struct Config {
  /// Root directory for all persisted state.
  pub data_dir: PathBuf,
  /// Service name written into the status summary.
  pub service_name: String,
  /// Status message used when no incident is active.
  pub idle_message: String,
  /// Max message ids retained in the dedup ledger (oldest dropped first).
  pub ledger_capacity: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir: PathBuf::from("data"),
      service_name: "Caltrain".to_string(),
      idle_message:
        "No active incidents. Trains are currently running under normal operations.".to_string(),
      ledger_capacity: 5000,
    }
  }
}
