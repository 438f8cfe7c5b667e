//! Execution repository functions.

use crate::{models::ExecutionRow, DbError, DbPool};

/// Insert an execution record, replacing any row with the same id.
pub async fn upsert_execution(pool: &DbPool, row: &ExecutionRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO executions
            (id, definition, status, current_step, input, output, error, history, started_at, ended_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            status = excluded.status,
            current_step = excluded.current_step,
            output = excluded.output,
            error = excluded.error,
            history = excluded.history,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(&row.id)
    .bind(&row.definition)
    .bind(&row.status)
    .bind(&row.current_step)
    .bind(&row.input)
    .bind(&row.output)
    .bind(&row.error)
    .bind(&row.history)
    .bind(&row.started_at)
    .bind(&row.ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch one execution by id.
pub async fn get_execution(pool: &DbPool, id: &str) -> Result<ExecutionRow, DbError> {
    sqlx::query_as::<_, ExecutionRow>(
        r#"
        SELECT id, definition, status, current_step, input, output, error, history, started_at, ended_at
        FROM executions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("executions", id))
}
