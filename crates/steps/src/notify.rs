//! Notification messages and the publish sinks they are delivered to.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::SinkError;

/// An outbound message published to a topic.
///
/// Failure notices carry the failing step and its error; the optional
/// `bucket`/`object` fields are forwarded when the payload that failed
/// referred to a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            step_name: None,
            error: None,
            order_id: None,
            bucket: None,
            object: None,
            published_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Publish sink for notifications.
///
/// Delivery to subscribers is the sink's concern; a step only needs to know
/// whether the message was accepted.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// In-process topic that fans every message out to its subscribers.
///
/// Publishing with no subscribers is not an error: the message is simply
/// dropped, like a topic without subscriptions.
#[derive(Debug, Clone)]
pub struct BroadcastTopic {
    name: String,
    sender: broadcast::Sender<Notification>,
}

impl BroadcastTopic {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            name: name.into(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new subscriber endpoint.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Publisher for BroadcastTopic {
    async fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        match self.sender.send(notification.clone()) {
            Ok(receivers) => {
                info!(
                    topic = %self.name,
                    receivers,
                    subject = %notification.subject,
                    "notification published"
                );
            }
            Err(_) => {
                debug!(topic = %self.name, "no subscribers, notification dropped");
            }
        }
        Ok(())
    }
}

/// Publisher that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<Notification>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        self.published
            .lock()
            .map_err(|_| SinkError::Unavailable("publisher state poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topic_fans_out_to_every_subscriber() {
        let topic = BroadcastTopic::new("order-failures", 16);
        let mut email = topic.subscribe();
        let mut audit = topic.subscribe();

        let mut notification = Notification::new("Order workflow failed");
        notification.step_name = Some("validate".into());
        notification.error = Some("Missing amount".into());
        topic.publish(&notification).await.unwrap();

        assert_eq!(email.recv().await.unwrap(), notification);
        assert_eq!(audit.recv().await.unwrap(), notification);
    }

    #[tokio::test]
    async fn topic_without_subscribers_accepts_messages() {
        let topic = BroadcastTopic::new("empty", 4);
        assert!(topic.publish(&Notification::new("hello")).await.is_ok());
    }

    #[tokio::test]
    async fn memory_publisher_records_messages() {
        let publisher = MemoryPublisher::new();
        publisher.publish(&Notification::new("one")).await.unwrap();
        publisher.publish(&Notification::new("two")).await.unwrap();

        let subjects: Vec<_> = publisher.published().into_iter().map(|n| n.subject).collect();
        assert_eq!(subjects, vec!["one", "two"]);
    }
}
