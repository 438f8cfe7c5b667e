//! Execution state and the terminal record handed to the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use steps::{payload, StepError};

use crate::ExecutionError;

// ---------------------------------------------------------------------------
// ExecutionId
// ---------------------------------------------------------------------------

/// Opaque, unique execution identifier shaped like a state-machine ARN:
/// `arn:local:states:execution:<definition>:<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn generate(definition: &str) -> Self {
        Self(format!(
            "arn:local:states:execution:{}:{}",
            definition,
            Uuid::new_v4()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ExecutionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an execution. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "TIMED_OUT" => Ok(Self::TimedOut),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// How a single step invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    /// Failed, and the failure was rerouted to `fallback`.
    Caught { fallback: String, message: String },
    Failed { message: String },
}

/// One step invocation in an execution's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub entered_at: DateTime<Utc>,
    pub exited_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CatchRecord
// ---------------------------------------------------------------------------

/// Error details merged into the payload before a fallback step runs, so the
/// fallback (and anything reading the final payload) can see what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchRecord {
    pub failed_step: String,
    pub error: StepError,
    /// Where the error lands in the payload, `$.<field>`.
    pub result_path: String,
}

impl CatchRecord {
    pub const DEFAULT_RESULT_PATH: &'static str = "$.error";

    pub fn new(error: StepError) -> Self {
        Self {
            failed_step: error.step_name.clone(),
            error,
            result_path: Self::DEFAULT_RESULT_PATH.to_owned(),
        }
    }

    /// Write the error into `payload` at the result path.
    ///
    /// Only top-level paths are supported; anything else falls back to
    /// `$.error`.
    pub fn apply(&self, payload: Value) -> Value {
        let field = self
            .result_path
            .strip_prefix("$.")
            .filter(|f| !f.is_empty() && !f.contains('.'))
            .unwrap_or("error");

        let mut error = json!({
            "stepName": self.failed_step,
            "message": self.error.message,
        });
        if let (Some(cause), Some(obj)) = (&self.error.cause, error.as_object_mut()) {
            obj.insert("cause".to_owned(), Value::String(cause.clone()));
        }

        payload::with_field(payload, field, error)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// One run of a definition. Mutated only by the executor driving it.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: ExecutionId,
    pub definition: String,
    pub input: Value,
    pub payload: Value,
    pub status: ExecutionStatus,
    pub current_step: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<ExecutionError>,
    pub history: Vec<HistoryEvent>,
}

impl Execution {
    pub fn new(id: ExecutionId, definition: impl Into<String>, input: Value) -> Self {
        Self {
            id,
            definition: definition.into(),
            payload: input.clone(),
            input,
            status: ExecutionStatus::Running,
            current_step: None,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            history: Vec::new(),
        }
    }

    /// Move to a terminal state. The first terminal transition wins.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<ExecutionError>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.ended_at = Some(Utc::now());
    }

    /// Snapshot for the store and the caller.
    pub fn into_record(self) -> ExecutionRecord {
        ExecutionRecord {
            id: self.id,
            definition: self.definition,
            status: self.status,
            current_step: self.current_step,
            input: self.input,
            output: self.payload,
            error: self.error,
            history: self.history,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Serializable snapshot of an execution. `error` is present iff the status
/// is not `SUCCEEDED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(rename = "executionArn")]
    pub id: ExecutionId,
    pub definition: String,
    pub status: ExecutionStatus,
    pub current_step: Option<String>,
    pub input: Value,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub history: Vec<HistoryEvent>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Step names in the order they were invoked.
    pub fn visited(&self) -> Vec<&str> {
        self.history.iter().map(|e| e.step.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_arn_shaped() {
        let a = ExecutionId::generate("order-workflow");
        let b = ExecutionId::generate("order-workflow");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("arn:local:states:execution:order-workflow:"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ExecutionStatus::Running,
            ExecutionStatus::Succeeded,
            ExecutionStatus::Failed,
            ExecutionStatus::TimedOut,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_value(ExecutionStatus::TimedOut).unwrap(),
            json!("TIMED_OUT")
        );
    }

    #[test]
    fn catch_record_writes_error_field() {
        let record = CatchRecord::new(StepError::new("validate", "Missing amount"));
        let payload = record.apply(json!({ "orderId": "1", "amount": 50 }));
        assert_eq!(
            payload,
            json!({
                "orderId": "1",
                "amount": 50,
                "error": { "stepName": "validate", "message": "Missing amount" },
            })
        );
    }

    #[test]
    fn catch_record_honours_custom_path_and_cause() {
        let mut record =
            CatchRecord::new(StepError::new("save", "failed to save order").with_cause("offline"));
        record.result_path = "$.failure".into();
        let payload = record.apply(json!(42));
        assert_eq!(payload["input"], 42);
        assert_eq!(payload["failure"]["cause"], "offline");
    }

    #[test]
    fn finish_keeps_first_terminal_state() {
        let mut execution = Execution::new(ExecutionId::generate("t"), "t", json!({}));
        execution.finish(ExecutionStatus::Succeeded, None);
        execution.finish(
            ExecutionStatus::Failed,
            Some(ExecutionError::Step(StepError::new("x", "late"))),
        );
        assert_eq!(execution.status, ExecutionStatus::Succeeded);
        assert!(execution.error.is_none());
        assert!(execution.ended_at.is_some());
    }
}
