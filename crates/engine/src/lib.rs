//! `engine` crate — definitions, workflow documents, and the execution engine.

pub mod definition;
pub mod error;
pub mod execution;
pub mod executor;
pub mod models;
pub mod registry;
pub mod sinks;
pub mod store;

pub use definition::{Definition, DefinitionBuilder};
pub use error::{ConfigError, ExecutionError, StoreError, TimeoutError};
pub use execution::{ExecutionId, ExecutionRecord, ExecutionStatus};
pub use executor::{ExecutionHandle, ExecutorConfig, WorkflowExecutor};
pub use models::WorkflowDocument;
pub use registry::StepRegistry;
pub use store::{ExecutionStore, MemoryExecutionStore, SqliteExecutionStore};
