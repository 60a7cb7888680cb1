//! Custom error types for the orchestration core.
//!
//! This module defines the primary error type, `FlowError`, used across the
//! crate. Using the `thiserror` crate, it provides a centralized way to handle
//! the failure classes that matter to a running experiment:
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or
//!   format issues in the experiment configuration.
//! - **`Configuration`**: Semantic errors in the configuration - values that
//!   parse fine but are logically invalid (an inverted resource range, a zero
//!   loop count). Caught during the validation step before any hardware moves.
//! - **`Io`**: Wraps `std::io::Error` for ledger and template file access.
//! - **`Template`**: A protocol template could not be read or its rendered
//!   copy could not be written, with the offending path attached.
//! - **`Dispatch`**: The external workflow engine reported a failure. These
//!   are fatal: the run halts and no automated physical cleanup is attempted.
//! - **`MissingStep`**: A workflow result did not contain the named step the
//!   driver needs a timestamp from. Fails fast rather than reading a stale or
//!   misaligned step entry.
//!
//! Dispatch failures and malformed results are fatal by policy; only
//! provenance-ledger I/O is defensively isolated (see
//! [`crate::experiment::ledger`]).

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Failure classes for the experiment orchestration core.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol template '{}': {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workflow '{workflow}' dispatch failed: {message}")]
    Dispatch { workflow: String, message: String },

    #[error("Workflow '{workflow}' returned no step named '{step}'")]
    MissingStep { workflow: String, step: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_step_names_workflow_and_step() {
        let err = FlowError::MissingStep {
            workflow: "incubator_to_run_bmg".into(),
            step: "bmg_read".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("incubator_to_run_bmg"));
        assert!(msg.contains("bmg_read"));
    }

    #[test]
    fn template_error_carries_path() {
        let err = FlowError::Template {
            path: PathBuf::from("protocols/inoculate.py"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("protocols/inoculate.py"));
    }
}
