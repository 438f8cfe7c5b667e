//! Database-backed collaborators for the order steps.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use db::models::{NotificationRow, OrderRow};
use db::DbPool;
use steps::{Notification, OrderRecord, OrderTable, Publisher, SinkError};

/// [`OrderTable`] writing to the `orders` table.
#[derive(Debug, Clone)]
pub struct SqliteOrderTable {
    pool: DbPool,
}

impl SqliteOrderTable {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderTable for SqliteOrderTable {
    async fn put_order(&self, record: &OrderRecord) -> Result<(), SinkError> {
        let row = OrderRow {
            order_id: record.order_id.clone(),
            amount: record.amount,
            status: record.status.clone(),
            processed_at: record.processed_at.clone(),
            saved: record.saved,
            updated_at: Utc::now().to_rfc3339(),
        };
        db::repository::orders::upsert_order(&self.pool, &row)
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

/// [`Publisher`] appending every notification to the outbox table.
#[derive(Debug, Clone)]
pub struct OutboxPublisher {
    pool: DbPool,
    topic: String,
}

impl OutboxPublisher {
    pub fn new(pool: DbPool, topic: impl Into<String>) -> Self {
        Self {
            pool,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        let message = serde_json::to_string(notification)
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        let row = NotificationRow {
            id: notification.id.to_string(),
            topic: self.topic.clone(),
            subject: notification.subject.clone(),
            message,
            published_at: notification.published_at.to_rfc3339(),
        };
        db::repository::notifications::insert_notification(&self.pool, &row)
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

/// Publishes to every inner publisher, failing on the first error.
pub struct FanoutPublisher {
    targets: Vec<Arc<dyn Publisher>>,
}

impl FanoutPublisher {
    pub fn new(targets: Vec<Arc<dyn Publisher>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Publisher for FanoutPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        for target in &self.targets {
            target.publish(notification).await?;
        }
        Ok(())
    }
}
