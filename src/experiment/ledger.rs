//! Append-only provenance ledger for plate readings.
//!
//! The plate reader writes its raw output under a generated filename, but the
//! filesystem timestamps on those files are unreliable (the reader node
//! buffers and transfers them later). The authoritative time of each reading
//! is the workflow step's completion timestamp, and this module durably pairs
//! the two: one CSV per experiment at `{csv_directory}/{experiment_id}.csv`,
//! header `bmg filename`,`utc timestamp`, one row appended per reading, in
//! reading order.
//!
//! Ledger writes must never abort a multi-hour physical run: every I/O
//! failure is caught, logged, and swallowed. The file is opened and closed
//! per append, so a crash between readings loses nothing already written.

use crate::error::FlowResult;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// CSV header row, written once when a ledger file is created.
const HEADER: [&str; 2] = ["bmg filename", "utc timestamp"];

/// Per-experiment append-only CSV of (reading filename, timestamp) pairs.
#[derive(Debug, Clone)]
pub struct ProvenanceLedger {
    csv_directory: PathBuf,
}

impl ProvenanceLedger {
    /// Ledger rooted at the given directory (created on first append).
    pub fn new(csv_directory: impl Into<PathBuf>) -> Self {
        Self {
            csv_directory: csv_directory.into(),
        }
    }

    /// Path of the ledger file for an experiment.
    pub fn csv_path(&self, experiment_id: &str) -> PathBuf {
        self.csv_directory.join(format!("{experiment_id}.csv"))
    }

    /// Append one provenance row.
    ///
    /// Any I/O failure is logged and swallowed; the run continues without the
    /// row.
    pub fn append(&self, experiment_id: &str, bmg_filename: &str, timestamp: DateTime<Utc>) {
        match self.try_append(experiment_id, bmg_filename, timestamp) {
            Ok(()) => {
                debug!(file = bmg_filename, %timestamp, "provenance row written");
            }
            Err(err) => {
                warn!(
                    experiment_id,
                    file = bmg_filename,
                    error = %err,
                    "could not write provenance row; continuing run"
                );
            }
        }
    }

    fn try_append(
        &self,
        experiment_id: &str,
        bmg_filename: &str,
        timestamp: DateTime<Utc>,
    ) -> FlowResult<()> {
        std::fs::create_dir_all(&self.csv_directory)?;

        let path = self.csv_path(experiment_id);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        if is_new {
            writer.write_record(HEADER).map_err(std::io::Error::from)?;
        }
        let rendered_timestamp = timestamp.to_rfc3339();
        writer
            .write_record([bmg_filename, rendered_timestamp.as_str()])
            .map_err(std::io::Error::from)?;
        writer.flush()?;
        Ok(())
    }

    /// The configured ledger directory.
    pub fn directory(&self) -> &Path {
        &self.csv_directory
    }
}
