//! Engine-level error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use steps::StepError;

/// A malformed definition. Raised while building, never while running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The chain has no steps.
    #[error("definition must contain at least one step")]
    EmptyChain,

    /// Two steps share the same name.
    #[error("duplicate step name: '{0}'")]
    DuplicateStep(String),

    /// A catch references a step that was never added or registered.
    #[error("catch references unknown step '{step}' ({side} side)")]
    UnknownStep { step: String, side: &'static str },

    /// A second catch was added for the same source step.
    #[error("step '{0}' already has a catch")]
    DuplicateCatch(String),

    /// A step would catch into itself.
    #[error("step '{0}' cannot catch into itself")]
    SelfCatch(String),

    /// A workflow document names a step type the registry does not know.
    #[error("no step type '{step_type}' registered (step '{step}')")]
    UnknownStepType { step: String, step_type: String },

    /// A workflow document could not be read or parsed.
    #[error("invalid workflow document: {0}")]
    Document(String),
}

/// A persistence-sink failure. Logged, never changes an execution's status.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Synthetic error produced when an execution runs out of time.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("execution timed out after {elapsed_ms}ms (limit {timeout_ms}ms) before step '{step_name}'")]
pub struct TimeoutError {
    /// The step that was about to run.
    pub step_name: String,
    pub elapsed_ms: u64,
    pub timeout_ms: u64,
}

impl TimeoutError {
    pub fn new(step_name: impl Into<String>, elapsed: Duration, timeout: Duration) -> Self {
        Self {
            step_name: step_name.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

/// The terminal error of an execution that did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error(transparent)]
    Step(StepError),

    #[error(transparent)]
    Timeout(TimeoutError),
}

impl ExecutionError {
    /// Name of the step the error is attributed to.
    pub fn step_name(&self) -> &str {
        match self {
            ExecutionError::Step(e) => &e.step_name,
            ExecutionError::Timeout(e) => &e.step_name,
        }
    }
}
