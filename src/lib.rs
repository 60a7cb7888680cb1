//! # plateflow
//!
//! Orchestration core for automated multi-day plate-biology experiments.
//! The crate sequences calls into an external lab-workflow engine that
//! drives the physical instruments (liquid handlers, plate readers,
//! incubators, robotic transfer arms); nothing here touches hardware
//! directly.
//!
//! ## Crate Structure
//!
//! - **`config`**: Strongly-typed experiment configuration loaded from TOML
//!   and environment variables. One config file replaces what used to be a
//!   per-experiment driver script.
//! - **`error`**: The central `FlowError` enum and `FlowResult` alias.
//! - **`experiment`**: The stateful core - the `ExperimentDriver` state
//!   machine plus its collaborators: loop counters, column mapping, resource
//!   cycles, incubation waits, and the provenance ledger.
//! - **`logging`**: `tracing` subscriber setup for bench and unattended
//!   runs.
//! - **`workflow`**: The engine boundary - workflow references, payloads,
//!   dispatch, named step results, and protocol templating.
//!
//! ## Orchestration model
//!
//! A single sequential driver owns all mutable state. Each outer iteration
//! it classifies the phase from the loop counter, dispatches the matching
//! workflow with a freshly-projected payload, runs a bounded inner loop of
//! plate readings (recording an authoritative timestamp per reading), and
//! blocks for incubation in between. Engine failures are fatal and halt the
//! machine without automated physical cleanup; provenance-ledger failures
//! are logged and swallowed.

pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod workflow;

pub use config::ExperimentConfig;
pub use error::{FlowError, FlowResult};
pub use experiment::ExperimentDriver;
pub use workflow::{Payload, WorkflowEngine, WorkflowRef, WorkflowResult};
