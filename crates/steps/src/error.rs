//! Step-level error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a step's `invoke` method.
///
/// The engine does not look at the message or cause when routing a failure:
/// only the identity of the failing step decides whether a catch applies.
/// Steps are never retried by the engine, so any retry policy belongs to the
/// step implementation itself.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("step '{step_name}' failed: {message}")]
pub struct StepError {
    /// Name of the failing step. The executor overwrites this with the name
    /// the step is registered under.
    pub step_name: String,
    /// Human readable failure description.
    pub message: String,
    /// Rendered underlying error, when the failure came from a downstream call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl StepError {
    pub fn new(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying error that triggered this failure.
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Failure reported by a step collaborator (order table, publisher).
///
/// Steps turn these into [`StepError`]s carrying the collaborator message as
/// the cause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink rejected the write: {0}")]
    Rejected(String),
}
