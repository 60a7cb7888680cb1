//! Workflow engine boundary: references, payloads, dispatch, results.
//!
//! The orchestration core never talks to instruments directly. Every physical
//! action - a robotic transfer, a liquid-handling protocol, a plate reading -
//! is a named workflow executed by an external engine. This module defines
//! that boundary:
//!
//! - [`WorkflowRef`]: an opaque, engine-resolvable handle (path or name)
//! - [`Payload`]: the flat parameter map passed with one invocation
//! - [`WorkflowEngine`]: the trait the concrete engine client implements
//! - [`WorkflowDispatcher`]: logged, awaited-to-completion dispatch
//! - [`WorkflowResult`]: named step outcomes with completion timestamps
//!
//! The driver is a single sequential task: exactly one dispatch is ever in
//! flight, and the dispatcher blocks (awaits) until the physical action
//! completes. Engine failures propagate uncaught - they are fatal to the run
//! and are not retried, and no automated physical cleanup is attempted.

pub mod payload;
pub mod protocol;
pub mod result;

pub use payload::{Payload, PayloadValue};
pub use protocol::ProtocolTemplate;
pub use result::{StepResult, WorkflowResult};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Opaque, engine-resolvable workflow handle (a path or a name).
///
/// The core treats the contents as a black box; only the engine interprets
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowRef(String);

impl WorkflowRef {
    /// Wrap an engine-resolvable handle.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The raw handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

impl From<String> for WorkflowRef {
    fn from(reference: String) -> Self {
        Self::new(reference)
    }
}

/// Client interface to the external lab-workflow engine.
///
/// Implementations submit the workflow with the payload and resolve once the
/// engine reports the run finished, returning the per-step outcomes. A failed
/// run resolves to an error.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Execute a workflow to completion.
    async fn start_run(&self, workflow: &WorkflowRef, payload: &Payload) -> Result<WorkflowResult>;
}

/// Dispatches workflows into the engine, one at a time.
///
/// A thin layer over [`WorkflowEngine`] that narrates each dispatch and
/// attaches the workflow reference to any engine error before it propagates.
/// There is no retry: a failed dispatch leaves hardware in an unknown state,
/// so the error surfaces and the run halts.
pub struct WorkflowDispatcher<E: WorkflowEngine> {
    engine: E,
}

impl<E: WorkflowEngine> WorkflowDispatcher<E> {
    /// Wrap an engine client.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Access the wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run a workflow to completion.
    ///
    /// # Errors
    ///
    /// Any engine-reported failure propagates with the workflow reference
    /// attached. Fatal to the run.
    pub async fn run(&self, workflow: &WorkflowRef, payload: &Payload) -> Result<WorkflowResult> {
        info!(workflow = %workflow, fields = payload.len(), "dispatching workflow");

        let result = self
            .engine
            .start_run(workflow, payload)
            .await
            .with_context(|| format!("workflow '{workflow}' dispatch failed"))?;

        info!(workflow = %workflow, steps = result.steps.len(), "workflow complete");
        Ok(result)
    }
}
