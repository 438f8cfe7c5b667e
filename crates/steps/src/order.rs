//! The order-processing steps: validate → process → save → notify.
//!
//! Every external client a step needs is handed to it at construction time,
//! so each step can be exercised on its own with in-memory fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::notify::{Notification, Publisher};
use crate::{payload, SinkError, Step, StepContext, StepError};

/// Row written by [`SaveOrder`], keyed by `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub amount: f64,
    pub status: String,
    pub processed_at: String,
    pub saved: bool,
}

/// Persistence sink for order records.
#[async_trait]
pub trait OrderTable: Send + Sync {
    /// Insert or replace the record stored under `record.order_id`.
    async fn put_order(&self, record: &OrderRecord) -> Result<(), SinkError>;
}

/// Order table kept in memory, keyed by order id.
#[derive(Debug, Default)]
pub struct MemoryOrderTable {
    rows: Mutex<HashMap<String, OrderRecord>>,
}

impl MemoryOrderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: &str) -> Option<OrderRecord> {
        self.rows.lock().ok()?.get(order_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderTable for MemoryOrderTable {
    async fn put_order(&self, record: &OrderRecord) -> Result<(), SinkError> {
        self.rows
            .lock()
            .map_err(|_| SinkError::Unavailable("order table poisoned".into()))?
            .insert(record.order_id.clone(), record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Rejects orders without an `orderId` or `amount`.
#[derive(Debug, Clone)]
pub struct ValidateOrder {
    name: String,
}

impl ValidateOrder {
    pub const DEFAULT_NAME: &'static str = "validate";

    pub fn new() -> Self {
        Self::named(Self::DEFAULT_NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ValidateOrder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ValidateOrder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value, ctx: &StepContext) -> Result<Value, StepError> {
        debug!(execution = %ctx.execution_id, "validating order");

        if !payload::is_truthy(input.get("orderId")) {
            return Err(StepError::new(&self.name, "Missing orderId"));
        }
        if !payload::is_truthy(input.get("amount")) {
            return Err(StepError::new(&self.name, "Missing amount"));
        }

        // Fields already on the order win over the flag.
        Ok(payload::merge(json!({ "isValid": true }), input))
    }
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

/// Stamps the order with `processedAt` and `status: "PROCESSED"`.
#[derive(Debug, Clone)]
pub struct ProcessOrder {
    name: String,
}

impl ProcessOrder {
    pub const DEFAULT_NAME: &'static str = "process";
    pub const PROCESSED: &'static str = "PROCESSED";

    pub fn new() -> Self {
        Self::named(Self::DEFAULT_NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ProcessOrder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ProcessOrder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value, ctx: &StepContext) -> Result<Value, StepError> {
        debug!(execution = %ctx.execution_id, "processing order");

        Ok(payload::merge(
            input,
            json!({
                "processedAt": Utc::now().to_rfc3339(),
                "status": Self::PROCESSED,
            }),
        ))
    }
}

// ---------------------------------------------------------------------------
// save
// ---------------------------------------------------------------------------

/// Persists the processed order through an [`OrderTable`].
pub struct SaveOrder {
    name: String,
    table: Arc<dyn OrderTable>,
}

impl SaveOrder {
    pub const DEFAULT_NAME: &'static str = "save";

    pub fn new(table: Arc<dyn OrderTable>) -> Self {
        Self::named(Self::DEFAULT_NAME, table)
    }

    pub fn named(name: impl Into<String>, table: Arc<dyn OrderTable>) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    fn record_from(&self, input: &Value) -> Result<OrderRecord, StepError> {
        let order_id = match input.get("orderId") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(StepError::new(&self.name, "Missing orderId")),
        };
        let amount = match input.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| StepError::new(&self.name, "Missing amount"))?;
        let status = input
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::new(&self.name, "Missing status"))?;
        let processed_at = input
            .get("processedAt")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::new(&self.name, "Missing processedAt"))?;

        Ok(OrderRecord {
            order_id,
            amount,
            status: status.to_owned(),
            processed_at: processed_at.to_owned(),
            saved: true,
        })
    }
}

#[async_trait]
impl Step for SaveOrder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value, ctx: &StepContext) -> Result<Value, StepError> {
        let record = self.record_from(&input)?;

        self.table.put_order(&record).await.map_err(|e| {
            StepError::new(&self.name, "failed to save order").with_cause(e)
        })?;

        info!(execution = %ctx.execution_id, order_id = %record.order_id, "order saved");
        Ok(payload::with_field(input, "saved", Value::Bool(true)))
    }
}

// ---------------------------------------------------------------------------
// notify
// ---------------------------------------------------------------------------

/// Publishes the outcome of the order workflow.
///
/// When the payload carries an `error` field (written by a catch reroute)
/// a failure notice is published; otherwise a completion notice.
pub struct NotifyOrder {
    name: String,
    publisher: Arc<dyn Publisher>,
}

impl NotifyOrder {
    pub const DEFAULT_NAME: &'static str = "notify";

    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::named(Self::DEFAULT_NAME, publisher)
    }

    pub fn named(name: impl Into<String>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            name: name.into(),
            publisher,
        }
    }

    fn notification_for(input: &Value) -> Notification {
        let text = |key: &str| input.get(key).and_then(Value::as_str).map(str::to_owned);
        let order_id = match input.get("orderId") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        let mut notification = match input.get("error") {
            Some(error) => {
                let step_name = error
                    .get("stepName")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let message = match error.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_owned(),
                    None => error.to_string(),
                };
                let subject = match &step_name {
                    Some(step) => format!("Order workflow failed at step '{step}'"),
                    None => "Order workflow failed".to_owned(),
                };
                let mut notification = Notification::new(subject);
                notification.step_name = step_name;
                notification.error = Some(message);
                notification
            }
            None => Notification::new(match &order_id {
                Some(id) => format!("Order {id} processed"),
                None => "Order processed".to_owned(),
            }),
        };

        notification.order_id = order_id;
        notification.bucket = text("bucket");
        notification.object = text("object");
        notification
    }
}

#[async_trait]
impl Step for NotifyOrder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value, ctx: &StepContext) -> Result<Value, StepError> {
        let notification = Self::notification_for(&input);

        self.publisher.publish(&notification).await.map_err(|e| {
            StepError::new(&self.name, "failed to publish notification").with_cause(e)
        })?;

        info!(
            execution = %ctx.execution_id,
            failure = notification.is_failure(),
            "notification sent"
        );
        Ok(payload::with_field(input, "notified", Value::Bool(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryPublisher;

    fn ctx() -> StepContext {
        StepContext::new("exec-1", "order-workflow")
    }

    struct BrokenTable;

    #[async_trait]
    impl OrderTable for BrokenTable {
        async fn put_order(&self, _record: &OrderRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("table offline".into()))
        }
    }

    #[tokio::test]
    async fn validate_marks_valid_orders() {
        let out = ValidateOrder::new()
            .invoke(json!({ "orderId": "1", "amount": 50 }), &ctx())
            .await
            .unwrap();
        assert_eq!(out, json!({ "orderId": "1", "amount": 50, "isValid": true }));
    }

    #[tokio::test]
    async fn validate_keeps_incoming_is_valid_flag() {
        let out = ValidateOrder::new()
            .invoke(json!({ "orderId": "1", "amount": 50, "isValid": false }), &ctx())
            .await
            .unwrap();
        assert_eq!(out["isValid"], false);
    }

    #[tokio::test]
    async fn validate_checks_order_id_before_amount() {
        let err = ValidateOrder::new().invoke(json!({}), &ctx()).await.unwrap_err();
        assert_eq!(err.message, "Missing orderId");

        let err = ValidateOrder::new()
            .invoke(json!({ "orderId": "1" }), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.step_name, "validate");
        assert_eq!(err.message, "Missing amount");
    }

    #[tokio::test]
    async fn validate_treats_zero_amount_as_missing() {
        let err = ValidateOrder::new()
            .invoke(json!({ "orderId": "1", "amount": 0 }), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.message, "Missing amount");
    }

    #[tokio::test]
    async fn process_stamps_the_order() {
        let out = ProcessOrder::new()
            .invoke(json!({ "orderId": "2", "amount": 100 }), &ctx())
            .await
            .unwrap();
        assert_eq!(out["status"], "PROCESSED");
        assert_eq!(out["orderId"], "2");
        let processed_at = out["processedAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(processed_at).is_ok());
    }

    #[tokio::test]
    async fn save_writes_the_record() {
        let table = Arc::new(MemoryOrderTable::new());
        let step = SaveOrder::new(table.clone());

        let out = step
            .invoke(
                json!({
                    "orderId": "2",
                    "amount": 100,
                    "status": "PROCESSED",
                    "processedAt": "2024-01-01T00:00:00+00:00",
                }),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(out["saved"], true);
        let record = table.get("2").unwrap();
        assert_eq!(record.amount, 100.0);
        assert_eq!(record.status, "PROCESSED");
        assert!(record.saved);
    }

    #[tokio::test]
    async fn save_requires_processed_fields() {
        let table = Arc::new(MemoryOrderTable::new());
        let err = SaveOrder::new(table.clone())
            .invoke(json!({ "orderId": "2", "amount": 100 }), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.message, "Missing status");
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn save_surfaces_table_failures_as_step_errors() {
        let err = SaveOrder::new(Arc::new(BrokenTable))
            .invoke(
                json!({
                    "orderId": "2",
                    "amount": 100,
                    "status": "PROCESSED",
                    "processedAt": "2024-01-01T00:00:00+00:00",
                }),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.step_name, "save");
        assert_eq!(err.cause.as_deref(), Some("sink unavailable: table offline"));
    }

    #[tokio::test]
    async fn notify_publishes_failure_notice_for_caught_errors() {
        let publisher = Arc::new(MemoryPublisher::new());
        let out = NotifyOrder::new(publisher.clone())
            .invoke(
                json!({
                    "orderId": "1",
                    "amount": 50,
                    "error": { "stepName": "validate", "message": "Missing amount" },
                }),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(out["notified"], true);
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].is_failure());
        assert_eq!(published[0].step_name.as_deref(), Some("validate"));
        assert_eq!(published[0].error.as_deref(), Some("Missing amount"));
        assert_eq!(published[0].order_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn notify_publishes_completion_notice() {
        let publisher = Arc::new(MemoryPublisher::new());
        NotifyOrder::new(publisher.clone())
            .invoke(json!({ "orderId": "2", "bucket": "uploads", "object": "a.csv" }), &ctx())
            .await
            .unwrap();

        let published = publisher.published();
        assert_eq!(published[0].subject, "Order 2 processed");
        assert!(!published[0].is_failure());
        assert_eq!(published[0].bucket.as_deref(), Some("uploads"));
        assert_eq!(published[0].object.as_deref(), Some("a.csv"));
    }
}
