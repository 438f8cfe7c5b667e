//! The `Step` trait — the contract every unit of work must fulfil.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::StepError;

/// Read-only context passed to every step invocation.
///
/// Defined here (in the steps crate) so both the engine and individual step
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Identifier of the execution this invocation belongs to.
    pub execution_id: String,
    /// Name of the definition being executed.
    pub definition: String,
    /// Wall-clock start of the execution.
    pub started_at: DateTime<Utc>,
}

impl StepContext {
    pub fn new(execution_id: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            definition: definition.into(),
            started_at: Utc::now(),
        }
    }
}

/// A named unit of work.
///
/// A step consumes the payload produced by the previous step and returns the
/// payload for the next one. Steps are stateless from the engine's point of
/// view: external clients are handed to them at construction time.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name of the step, unique within a definition.
    fn name(&self) -> &str;

    /// Run the step against `payload`.
    async fn invoke(&self, payload: Value, ctx: &StepContext) -> Result<Value, StepError>;
}
