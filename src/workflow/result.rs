//! Workflow results - named step outcomes with completion timestamps.
//!
//! The external engine reports one [`StepResult`] per physical action in a
//! workflow. The driver consumes a [`WorkflowResult`] immediately after the
//! dispatch that produced it; nothing here is persisted. The only value
//! extracted for durable storage is the end timestamp of the plate-reader
//! step, which becomes the authoritative timestamp in the provenance ledger.
//!
//! Steps are resolved **by name**. The engine-side step index is not part of
//! the contract: positional lookups silently break whenever a workflow
//! definition gains or loses a step, so [`WorkflowResult::step_end_time`]
//! fails fast with [`FlowError::MissingStep`] instead.

use crate::error::{FlowError, FlowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one step inside a completed workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step identifier from the workflow definition
    pub name: String,
    /// Completion timestamp reported by the engine (authoritative for
    /// instrument reads)
    pub end_time: DateTime<Utc>,
}

impl StepResult {
    /// Create a step result.
    pub fn new(name: impl Into<String>, end_time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            end_time,
        }
    }
}

/// Ordered step outcomes of one completed workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// The workflow reference this result came from
    pub workflow: String,
    /// Step outcomes in execution order
    pub steps: Vec<StepResult>,
}

impl WorkflowResult {
    /// Create an empty result for the given workflow reference.
    pub fn new(workflow: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step outcome, builder style.
    pub fn with_step(mut self, name: impl Into<String>, end_time: DateTime<Utc>) -> Self {
        self.steps.push(StepResult::new(name, end_time));
        self
    }

    /// Find a step by name.
    ///
    /// If a workflow somehow contains duplicate step names, the first match
    /// wins (execution order).
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.name == name)
    }

    /// Extract the completion timestamp of the named step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingStep`] when the step is absent. Callers
    /// must treat this as fatal: a missing read step means there is no
    /// trustworthy timestamp for the reading just taken.
    pub fn step_end_time(&self, name: &str) -> FlowResult<DateTime<Utc>> {
        self.step(name)
            .map(|step| step.end_time)
            .ok_or_else(|| FlowError::MissingStep {
                workflow: self.workflow.clone(),
                step: name.to_string(),
            })
    }
}
