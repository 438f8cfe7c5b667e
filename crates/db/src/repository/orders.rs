//! Order repository functions.

use crate::{models::OrderRow, DbError, DbPool};

/// Write the order, replacing the row stored under the same `order_id`.
pub async fn upsert_order(pool: &DbPool, row: &OrderRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO orders (order_id, amount, status, processed_at, saved, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (order_id) DO UPDATE SET
            amount = excluded.amount,
            status = excluded.status,
            processed_at = excluded.processed_at,
            saved = excluded.saved,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.order_id)
    .bind(row.amount)
    .bind(&row.status)
    .bind(&row.processed_at)
    .bind(row.saved)
    .bind(&row.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_order(pool: &DbPool, order_id: &str) -> Result<OrderRow, DbError> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT order_id, amount, status, processed_at, saved, updated_at
        FROM orders
        WHERE order_id = ?
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("orders", order_id))
}
