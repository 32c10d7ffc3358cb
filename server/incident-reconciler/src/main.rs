//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is an InboundAlert from the normalizer collaborator.
//! Output lines are either:
//! - An ApplyOutput (applied or duplicate)
//! - An ErrorOutput (when input validation fails)
//!
//! At end of input the batch is closed: the dedup ledger is saved and, if
//! anything was applied, the status summary is recomputed once.
//!
//! The data directory comes from the first argument (default "data").

use incident_reconciler::types::{ApplyOutput, ErrorOutput};
use incident_reconciler::{ApplyOutcome, Config, Engine, EngineError};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
  tracing_subscriber::fmt::init();

  let mut config = Config::default();
  if let Some(dir) = std::env::args().nth(1) {
    config.data_dir = PathBuf::from(dir);
  }

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut engine = Engine::new(config);

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        let _ = writeln!(io::stderr(), "incident-reconciler: read error: {}", e);
        std::process::exit(1);
      }
    };

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    // Parse inbound alert.
    let raw: incident_reconciler::InboundAlert = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        let err = ErrorOutput::new(format!("json parse: {}", e));
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
        continue;
      }
    };

    // Process through the engine.
    match engine.apply(&raw) {
      Ok(ApplyOutcome::Applied {
        incident,
        snapshot_path,
      }) => {
        let output = ApplyOutput::Applied {
          message_id: raw.message_id.clone(),
          incident_id: incident.id,
          status: incident.status,
          snapshot_path,
        };
        let _ = serde_json::to_writer(&mut out, &output);
        let _ = writeln!(out);
      }
      Ok(ApplyOutcome::Duplicate) => {
        // A no-op for state, but the upstream source still needs the ack.
        let output = ApplyOutput::Duplicate {
          message_id: raw.message_id.clone(),
        };
        let _ = serde_json::to_writer(&mut out, &output);
        let _ = writeln!(out);
      }
      Err(e) => {
        let err = match &e {
          EngineError::Validation { field, reason } => {
            ErrorOutput::new(reason.clone()).with_field(field.clone())
          }
          EngineError::Io { .. } => {
            // The store is unusable; nothing downstream can recover.
            let _ = writeln!(io::stderr(), "incident-reconciler: {}", e);
            std::process::exit(1);
          }
          _ => ErrorOutput::new(e.to_string()),
        };
        let _ = serde_json::to_writer(&mut out, &err);
        let _ = writeln!(out);
      }
    }
  }

  if let Err(e) = engine.finish_batch(chrono::Utc::now()) {
    let _ = writeln!(io::stderr(), "incident-reconciler: {}", e);
    std::process::exit(1);
  }

  let _ = out.flush();
}
