//! Notification outbox repository functions.

use crate::{models::NotificationRow, DbError, DbPool};

/// Append a notification to the outbox.
pub async fn insert_notification(pool: &DbPool, row: &NotificationRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, topic, subject, message, published_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.topic)
    .bind(&row.subject)
    .bind(&row.message)
    .bind(&row.published_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Notifications published to `topic`, oldest first.
pub async fn list_notifications(pool: &DbPool, topic: &str) -> Result<Vec<NotificationRow>, DbError> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, topic, subject, message, published_at
        FROM notifications
        WHERE topic = ?
        ORDER BY published_at ASC
        "#,
    )
    .bind(topic)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
