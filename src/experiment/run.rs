//! Experiment run identity.
//!
//! An [`ExperimentRun`] is created once when the experiment is registered and
//! never mutated afterwards. Its `experiment_id` names the provenance ledger
//! file and appears in every generated reading filename, which is what lets
//! a reading on disk be traced back to the run that produced it months later.

use crate::experiment::state::LoopState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable identity of one experiment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRun {
    /// Unique run identifier (UUIDv4)
    pub experiment_id: String,
    /// Short label stamped into reading filenames
    pub label: String,
    /// Campaign this run belongs to
    pub campaign: String,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl ExperimentRun {
    /// Register a new run with a fresh identifier.
    pub fn register(label: impl Into<String>, campaign: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().to_string(),
            label: label.into(),
            campaign: campaign.into(),
            registered_at: Utc::now(),
        }
    }

    /// Generate the plate-reader output filename for the reading the driver
    /// is about to take.
    ///
    /// Format:
    /// `{label}_{unix_time}_{experiment_id}_{plate_num}_{transfer_num}_{reading_num}.txt`
    pub fn reading_filename(&self, state: &LoopState, unix_time: i64) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}.txt",
            self.label,
            unix_time,
            self.experiment_id,
            state.plate_num,
            state.transfer_in_plate_number,
            state.reading_number_in_plate,
        )
    }
}
