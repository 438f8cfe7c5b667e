//! Errors raised by the persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Connection or query failure reported by SQLite.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A keyed lookup matched no row.
    #[error("no row in '{table}' with key '{key}'")]
    NotFound { table: &'static str, key: String },

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub(crate) fn not_found(table: &'static str, key: &str) -> Self {
        DbError::NotFound {
            table,
            key: key.to_owned(),
        }
    }
}
