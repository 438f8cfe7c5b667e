//! Execution store adapters.
//!
//! The executor hands every terminal record to an [`ExecutionStore`] exactly
//! once. It never reads records back; `get` exists for external callers such
//! as the HTTP layer.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use db::models::ExecutionRow;
use db::DbPool;

use crate::execution::{ExecutionId, ExecutionRecord};
use crate::StoreError;

/// Write sink for terminal execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn put(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Store that keeps records in a map. Used in tests and for `run` from the CLI.
#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    records: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored records, in no particular order.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn put(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("execution map poisoned".into()))?
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("execution map poisoned".into()))?;
        Ok(records.get(&ExecutionId::from(id.to_owned())).cloned())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Store backed by the `executions` table.
#[derive(Debug, Clone)]
pub struct SqliteExecutionStore {
    pool: DbPool,
}

impl SqliteExecutionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_row(record: &ExecutionRecord) -> Result<ExecutionRow, StoreError> {
    Ok(ExecutionRow {
        id: record.id.to_string(),
        definition: record.definition.clone(),
        status: record.status.to_string(),
        current_step: record.current_step.clone(),
        input: serde_json::to_string(&record.input)?,
        output: serde_json::to_string(&record.output)?,
        error: record
            .error
            .as_ref()
            .map(|e| serde_json::to_string(e))
            .transpose()?,
        history: serde_json::to_string(&record.history)?,
        started_at: record.started_at.to_rfc3339(),
        ended_at: record.ended_at.map(|t| t.to_rfc3339()),
    })
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Unavailable(format!("invalid timestamp '{s}': {e}")))
}

fn from_row(row: ExecutionRow) -> Result<ExecutionRecord, StoreError> {
    Ok(ExecutionRecord {
        id: ExecutionId::from(row.id),
        definition: row.definition,
        status: row.status.parse().map_err(StoreError::Unavailable)?,
        current_step: row.current_step,
        input: serde_json::from_str(&row.input)?,
        output: serde_json::from_str(&row.output)?,
        error: row
            .error
            .as_deref()
            .map(|e| serde_json::from_str(e))
            .transpose()?,
        history: serde_json::from_str(&row.history)?,
        started_at: parse_time(&row.started_at)?,
        ended_at: row.ended_at.as_deref().map(parse_time).transpose()?,
    })
}

#[async_trait]
impl ExecutionStore for SqliteExecutionStore {
    async fn put(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let row = to_row(record)?;
        db::repository::executions::upsert_execution(&self.pool, &row).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        match db::repository::executions::get_execution(&self.pool, id).await {
            Ok(row) => from_row(row).map(Some),
            Err(db::DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
