//! `db` crate — SQLite persistence for the order workflow.
//!
//! Holds the pool, the row structs, and one repository module per table
//! (`executions`, `orders`, `notifications`). Rows are plain text/JSON; the
//! engine owns the mapping to its domain types.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use pool::{create_pool, memory_pool, run_migrations, DbPool};
