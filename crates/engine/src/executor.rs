//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Creates an `Execution` in `RUNNING` state for the start request.
//! 2. Invokes the definition's chain in order, passing each step's JSON output
//!    as the next step's input.
//! 3. On a step failure consults the catch table: a catch reroutes once to the
//!    fallback step with the error merged into the payload, otherwise the
//!    execution fails.
//! 4. Checks the wall-clock timeout before every step (never mid-step).
//! 5. Hands the terminal record to the `ExecutionStore`; store failures are
//!    logged and never change the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use steps::StepContext;

use crate::definition::Definition;
use crate::execution::{
    CatchRecord, Execution, ExecutionId, ExecutionRecord, ExecutionStatus, HistoryEvent,
    StepOutcome,
};
use crate::store::ExecutionStore;
use crate::{ExecutionError, TimeoutError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock limit for one execution, used when the definition does not
    /// set its own.
    pub timeout: Duration,
}

impl ExecutorConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle to a started execution
// ---------------------------------------------------------------------------

/// Returned by [`WorkflowExecutor::start`] before the execution finishes.
#[derive(Debug)]
pub struct ExecutionHandle {
    id: ExecutionId,
    join: JoinHandle<ExecutionRecord>,
}

impl ExecutionHandle {
    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    /// Wait for the execution to reach a terminal state.
    pub async fn outcome(self) -> Result<ExecutionRecord, JoinError> {
        self.join.await
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Drives executions of immutable definitions.
///
/// Cheap to clone: every clone shares the same store. Executions never share
/// mutable state with each other.
#[derive(Clone)]
pub struct WorkflowExecutor {
    store: Arc<dyn ExecutionStore>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(store: Arc<dyn ExecutionStore>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Run the definition to completion and return the terminal record.
    ///
    /// Step failures and timeouts are reported through the record's status,
    /// never as an `Err`.
    pub async fn run(&self, definition: &Definition, input: Value) -> ExecutionRecord {
        let id = ExecutionId::generate(definition.name());
        self.run_with_id(definition, id, input).await
    }

    /// Start an execution on its own task and return immediately.
    pub fn start(&self, definition: Arc<Definition>, input: Value) -> ExecutionHandle {
        let id = ExecutionId::generate(definition.name());
        let executor = self.clone();
        let task_id = id.clone();
        let join =
            tokio::spawn(async move { executor.run_with_id(&definition, task_id, input).await });
        ExecutionHandle { id, join }
    }

    #[instrument(
        skip(self, definition, id, input),
        fields(definition = %definition.name(), execution = %id)
    )]
    async fn run_with_id(
        &self,
        definition: &Definition,
        id: ExecutionId,
        input: Value,
    ) -> ExecutionRecord {
        let timeout = definition.timeout().unwrap_or(self.config.timeout);
        let mut execution = Execution::new(id, definition.name(), input);
        let ctx = StepContext {
            execution_id: execution.id.to_string(),
            definition: definition.name().to_owned(),
            started_at: execution.started_at,
        };

        info!("execution started ({} steps, timeout {:?})", definition.len(), timeout);
        drive(definition, &mut execution, &ctx, timeout).await;

        let record = execution.into_record();
        match record.status {
            ExecutionStatus::Succeeded => info!("execution succeeded"),
            status => error!(
                "execution ended {}: {}",
                status,
                record
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
        }

        // Best effort: the caller gets the terminal record either way.
        if let Err(e) = self.store.put(&record).await {
            error!("failed to store execution record: {}", e);
        }

        record
    }
}

// ---------------------------------------------------------------------------
// Internal: the state machine.
// ---------------------------------------------------------------------------

async fn drive(
    definition: &Definition,
    execution: &mut Execution,
    ctx: &StepContext,
    timeout: Duration,
) {
    let clock = Instant::now();
    let mut position = 0usize;
    let mut next = definition.chain_at(position);
    // Set once a catch fires. A rerouted step ends the run whatever happens.
    let mut rerouted = false;

    execution.current_step = next.map(|i| definition.step_at(i).name().to_owned());

    while let Some(index) = next {
        let step = definition.step_at(index);
        let name = step.name();

        let elapsed = clock.elapsed();
        if elapsed >= timeout {
            warn!("timeout reached before step '{}' ({:?} elapsed)", name, elapsed);
            execution.finish(
                ExecutionStatus::TimedOut,
                Some(ExecutionError::Timeout(TimeoutError::new(name, elapsed, timeout))),
            );
            return;
        }

        execution.current_step = Some(name.to_owned());
        let entered_at = Utc::now();

        match step.invoke(execution.payload.clone(), ctx).await {
            Ok(output) => {
                info!("step '{}' succeeded", name);
                execution.history.push(HistoryEvent {
                    step: name.to_owned(),
                    outcome: StepOutcome::Succeeded,
                    entered_at,
                    exited_at: Utc::now(),
                });
                execution.payload = output;

                next = if rerouted {
                    None
                } else {
                    position += 1;
                    definition.chain_at(position)
                };
            }

            Err(mut step_error) => {
                step_error.step_name = name.to_owned();
                let fallback = definition.catch_at(index).filter(|_| !rerouted);

                match fallback {
                    Some(fallback) => {
                        let fallback_name = definition.step_at(fallback).name();
                        warn!(
                            "step '{}' failed, rerouting to '{}': {}",
                            name, fallback_name, step_error.message
                        );
                        execution.history.push(HistoryEvent {
                            step: name.to_owned(),
                            outcome: StepOutcome::Caught {
                                fallback: fallback_name.to_owned(),
                                message: step_error.message.clone(),
                            },
                            entered_at,
                            exited_at: Utc::now(),
                        });

                        let payload = std::mem::take(&mut execution.payload);
                        execution.payload = CatchRecord::new(step_error).apply(payload);
                        rerouted = true;
                        next = Some(fallback);
                    }
                    None => {
                        error!("step '{}' failed: {}", name, step_error.message);
                        execution.history.push(HistoryEvent {
                            step: name.to_owned(),
                            outcome: StepOutcome::Failed {
                                message: step_error.message.clone(),
                            },
                            entered_at,
                            exited_at: Utc::now(),
                        });
                        execution.finish(
                            ExecutionStatus::Failed,
                            Some(ExecutionError::Step(step_error)),
                        );
                        return;
                    }
                }
            }
        }
    }

    execution.finish(ExecutionStatus::Succeeded, None);
}
