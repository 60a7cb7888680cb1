//! Experiment configuration.
//!
//! Strongly-typed configuration for one experiment variant, loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables (prefixed with `PLATEFLOW_`, nested keys joined
//!    with `__`, e.g. `PLATEFLOW_EXPERIMENT__TOTAL_LOOPS=33`)
//!
//! Historically each experiment variant was its own near-identical driver
//! script differing only in cycle length, inner-loop count, resource bounds,
//! and location names. All of those knobs live here instead, so one driver
//! serves every variant.
//!
//! Validation is split the same way as parsing: figment/serde reject
//! malformed files, and [`ExperimentConfig::validate`] rejects values that
//! parse fine but are semantically wrong (inverted resource bounds, zero
//! loop counts). Validation runs before anything is dispatched - a config
//! mistake must not surface ten hours into a run.
//!
//! # Example
//! ```no_run
//! use plateflow::config::ExperimentConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExperimentConfig::load_from("config/substrate_exp3.toml")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{FlowError, FlowResult};
use crate::experiment::columns::CycleLength;
use crate::experiment::resources::{CycleBounds, ResourceCycle};
use crate::workflow::{PayloadValue, WorkflowRef};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for one experiment variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Identity and loop counts
    pub experiment: ExperimentSettings,
    /// Incubation durations and polling
    pub incubation: IncubationSettings,
    /// Cyclic consumable locations
    pub resources: ResourceSettings,
    /// Named instrument/location identifiers merged into every payload
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
    /// Fixed typed parameters merged into every payload (volumes, flags,
    /// assay names)
    #[serde(default)]
    pub parameters: BTreeMap<String, PayloadValue>,
    /// Workflow references and the named read step
    pub workflows: WorkflowSettings,
    /// Liquid-handler protocol templating
    pub protocol: ProtocolSettings,
    /// Provenance ledger output
    pub provenance: ProvenanceSettings,
}

/// Experiment identity and loop structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSettings {
    /// Short label stamped into reading filenames
    pub label: String,
    /// Campaign the run is registered under
    pub campaign: String,
    /// Outer iterations before the finalize transfer
    pub total_loops: u64,
    /// Transfers per plate (3 or 4)
    pub cycle_length: CycleLength,
    /// Readings taken per outer iteration
    pub inner_loop_count: u32,
}

/// Incubation timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncubationSettings {
    /// Hold after the first-cycle inoculation, before the first reading
    /// (e.g. "10h"). Zero skips the initial hold.
    #[serde(default, with = "humantime_serde")]
    pub initial: Duration,
    /// Hold between consecutive readings (e.g. "1h")
    #[serde(with = "humantime_serde")]
    pub between_readings: Duration,
    /// Pause between remaining-time checks while waiting
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// Bounds for the three consumable cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// Pipette-tip rack slots on the liquid-handler deck
    pub tip_box: CycleBounds,
    /// Tower decks holding spare plates
    pub plate_stack: CycleBounds,
    /// Lid parking nests
    pub lid_nest: CycleBounds,
}

/// Workflow references for each dispatch the driver makes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Plate prep + first inoculation (iteration 0)
    pub first_cycle: WorkflowRef,
    /// Within-plate liquid-handling transfer
    pub within_plate: WorkflowRef,
    /// Fetch a fresh plate from the stack
    pub between_plate: WorkflowRef,
    /// Move the plate to the reader and take a reading
    pub read: WorkflowRef,
    /// Return the plate to the incubator
    pub to_incubator: WorkflowRef,
    /// Route the plate to the liquid handler (final reading of an iteration)
    pub to_liquid_handler: WorkflowRef,
    /// End-of-run transfer back to the exchange
    pub finalize: WorkflowRef,
    /// Name of the plate-reader step inside the read workflow, used to
    /// extract the authoritative reading timestamp
    pub read_step: String,
}

/// Liquid-handler protocol templating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Template file with `$token` placeholders
    pub template: PathBuf,
}

/// Provenance ledger output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceSettings {
    /// Directory holding one `{experiment_id}.csv` per run
    pub csv_directory: PathBuf,
}

impl ExperimentConfig {
    /// Load configuration from the default path and environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config/experiment.toml")
    }

    /// Load configuration from a specific file path plus environment
    /// variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PLATEFLOW_").split("__"))
            .extract()
    }

    /// Validate configuration after loading.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Configuration`] for semantically invalid values.
    pub fn validate(&self) -> FlowResult<()> {
        if self.experiment.label.is_empty() {
            return Err(FlowError::Configuration(
                "experiment.label must not be empty".into(),
            ));
        }
        if self.experiment.total_loops == 0 {
            return Err(FlowError::Configuration(
                "experiment.total_loops must be at least 1".into(),
            ));
        }
        if self.experiment.inner_loop_count == 0 {
            return Err(FlowError::Configuration(
                "experiment.inner_loop_count must be at least 1".into(),
            ));
        }
        if self.workflows.read_step.is_empty() {
            return Err(FlowError::Configuration(
                "workflows.read_step must name the plate-reader step".into(),
            ));
        }
        if self.provenance.csv_directory.as_os_str().is_empty() {
            return Err(FlowError::Configuration(
                "provenance.csv_directory must not be empty".into(),
            ));
        }

        // Constructing the cycles performs the bounds checks
        self.tip_box_cycle()?;
        self.plate_stack_cycle()?;
        self.lid_nest_cycle()?;
        Ok(())
    }

    /// Build the tip-box cycle from configured bounds.
    pub fn tip_box_cycle(&self) -> FlowResult<ResourceCycle> {
        ResourceCycle::from_bounds("tip_box_location", self.resources.tip_box)
    }

    /// Build the plate-stack cycle from configured bounds.
    pub fn plate_stack_cycle(&self) -> FlowResult<ResourceCycle> {
        ResourceCycle::from_bounds("plate_stack", self.resources.plate_stack)
    }

    /// Build the lid-nest cycle from configured bounds.
    pub fn lid_nest_cycle(&self) -> FlowResult<ResourceCycle> {
        ResourceCycle::from_bounds("lid_nest", self.resources.lid_nest)
    }
}
