//! `MockStep` — a test double for `Step`.
//!
//! Useful in unit and integration tests where a real step implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{payload, Step, StepContext, StepError};

/// Behaviour injected into `MockStep` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return the input as-is.
    Passthrough,
    /// Merge the given value over the input and return it.
    Merge(Value),
    /// Fail with the given message.
    Fail(String),
    /// Sleep, then merge the given value over the input.
    Delay(Duration, Value),
    /// Sleep, then fail with the given message.
    DelayThenFail(Duration, String),
}

/// A mock step that records every payload it receives and returns a
/// programmer-specified result.
#[derive(Debug, Clone)]
pub struct MockStep {
    name: String,
    behaviour: MockBehaviour,
    /// All inputs seen by this step (in call order). Shared between clones so
    /// a test can keep a handle after moving the step into a definition.
    calls: Arc<Mutex<Vec<Value>>>,
}

impl MockStep {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that succeeds, merging `value` over its input.
    pub fn merging(name: impl Into<String>, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::Merge(value))
    }

    /// Create a mock that passes its input through unchanged.
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Passthrough)
    }

    /// Create a mock that always fails with `msg`.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that sleeps for `delay` before merging `value`.
    pub fn delayed(name: impl Into<String>, delay: Duration, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::Delay(delay, value))
    }

    /// Create a mock that sleeps for `delay`, then fails with `msg`.
    pub fn failing_after(name: impl Into<String>, delay: Duration, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::DelayThenFail(delay, msg.into()))
    }

    /// Number of times this step has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Inputs received so far, oldest first.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Step for MockStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value, _ctx: &StepContext) -> Result<Value, StepError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(input.clone());
        }

        match &self.behaviour {
            MockBehaviour::Passthrough => Ok(input),
            MockBehaviour::Merge(value) => Ok(payload::merge(input, value.clone())),
            MockBehaviour::Fail(msg) => Err(StepError::new(&self.name, msg.clone())),
            MockBehaviour::Delay(delay, value) => {
                tokio::time::sleep(*delay).await;
                Ok(payload::merge(input, value.clone()))
            }
            MockBehaviour::DelayThenFail(delay, msg) => {
                tokio::time::sleep(*delay).await;
                Err(StepError::new(&self.name, msg.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> StepContext {
        StepContext::new("exec-1", "test")
    }

    #[tokio::test]
    async fn merging_mock_records_calls() {
        let step = MockStep::merging("a", json!({ "step": 1 }));
        let out = step.invoke(json!({ "origin": "trigger" }), &ctx()).await.unwrap();

        assert_eq!(out, json!({ "origin": "trigger", "step": 1 }));
        assert_eq!(step.call_count(), 1);
        assert_eq!(step.calls(), vec![json!({ "origin": "trigger" })]);
    }

    #[tokio::test]
    async fn failing_mock_reports_its_name() {
        let step = MockStep::failing("boom", "something broke");
        let err = step.invoke(json!({}), &ctx()).await.unwrap_err();

        assert_eq!(err.step_name, "boom");
        assert_eq!(err.message, "something broke");
        assert_eq!(step.call_count(), 1);
    }

    #[tokio::test]
    async fn clones_share_the_call_log() {
        let step = MockStep::passthrough("p");
        let handle = step.clone();
        step.invoke(json!({ "x": 1 }), &ctx()).await.unwrap();
        assert_eq!(handle.call_count(), 1);
    }

    #[tokio::test]
    async fn passthrough_returns_non_object_input_unchanged() {
        let step = MockStep::passthrough("p");
        assert_eq!(step.invoke(json!([1, 2]), &ctx()).await.unwrap(), json!([1, 2]));
        assert_eq!(step.invoke(json!("raw"), &ctx()).await.unwrap(), json!("raw"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_after_sleeps_then_fails() {
        let step = MockStep::failing_after("slow", Duration::from_secs(3), "gave up");
        let started = tokio::time::Instant::now();
        let err = step.invoke(json!({}), &ctx()).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(err.message, "gave up");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_mock_sleeps_before_returning() {
        let step = MockStep::delayed("slow", Duration::from_secs(5), json!({ "done": true }));
        let started = tokio::time::Instant::now();
        let out = step.invoke(json!({}), &ctx()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(out, json!({ "done": true }));
    }
}
