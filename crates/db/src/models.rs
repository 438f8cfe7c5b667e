//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! JSON documents and timestamps are stored as text; the engine owns their
//! shape.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// executions
// ---------------------------------------------------------------------------

/// A persisted terminal execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: String,
    pub definition: String,
    pub status: String,
    pub current_step: Option<String>,
    /// Initial payload (JSON text).
    pub input: String,
    /// Final payload (JSON text).
    pub output: String,
    /// Terminal error (JSON text), absent for successful runs.
    pub error: Option<String>,
    /// Step history (JSON text).
    pub history: String,
    /// RFC 3339 timestamp.
    pub started_at: String,
    /// RFC 3339 timestamp.
    pub ended_at: Option<String>,
}

// ---------------------------------------------------------------------------
// orders
// ---------------------------------------------------------------------------

/// A persisted order row, keyed by `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderRow {
    pub order_id: String,
    pub amount: f64,
    pub status: String,
    pub processed_at: String,
    pub saved: bool,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// notifications
// ---------------------------------------------------------------------------

/// A notification written to the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: String,
    pub topic: String,
    pub subject: String,
    /// Full message body (JSON text).
    pub message: String,
    pub published_at: String,
}
