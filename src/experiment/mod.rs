//! Experiment orchestration: state machine, counters, timing, provenance.
//!
//! This module is the stateful heart of the crate. Everything the driver
//! composes lives here:
//!
//! - [`driver::ExperimentDriver`] - the top-level iteration loop
//! - [`state`] - lifecycle states, phases, and loop counters
//! - [`run::ExperimentRun`] - immutable run identity
//! - [`columns`] - loop-index to well-column mapping
//! - [`resources`] - cyclic consumable counters
//! - [`incubation`] - blocking incubation waits
//! - [`ledger`] - the append-only provenance CSV

pub mod columns;
pub mod driver;
pub mod incubation;
pub mod ledger;
pub mod resources;
pub mod run;
pub mod state;

pub use columns::{transfer_columns, CycleLength, TransferColumns};
pub use driver::ExperimentDriver;
pub use incubation::{Clock, IncubationWaiter, SystemClock};
pub use ledger::ProvenanceLedger;
pub use resources::{CycleBounds, ResourceCycle};
pub use run::ExperimentRun;
pub use state::{ExperimentState, LoopState, Phase};
