//! Step registry: maps the `type` of a document step to a factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use steps::{NotifyOrder, OrderTable, ProcessOrder, Publisher, SaveOrder, Step, ValidateOrder};

use crate::definition::Definition;
use crate::models::{StepDocument, WorkflowDocument};
use crate::ConfigError;

/// Builds a step from its name and document config.
pub type StepFactory = Arc<dyn Fn(&str, &Value) -> Arc<dyn Step> + Send + Sync>;

/// Known step types.
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("StepRegistry").field("types", &types).finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four order step types wired to the given sinks.
    pub fn orders(table: Arc<dyn OrderTable>, publisher: Arc<dyn Publisher>) -> Self {
        let mut registry = Self::new();
        registry.register("validate_order", |name, _| {
            Arc::new(ValidateOrder::named(name)) as Arc<dyn Step>
        });
        registry.register("process_order", |name, _| {
            Arc::new(ProcessOrder::named(name)) as Arc<dyn Step>
        });
        registry.register("save_order", move |name, _| {
            Arc::new(SaveOrder::named(name, table.clone())) as Arc<dyn Step>
        });
        registry.register("notify_order", move |name, _| {
            Arc::new(NotifyOrder::named(name, publisher.clone())) as Arc<dyn Step>
        });
        registry
    }

    /// Register (or replace) the factory for `step_type`.
    pub fn register<F>(&mut self, step_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str, &Value) -> Arc<dyn Step> + Send + Sync + 'static,
    {
        self.factories.insert(step_type.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.factories.contains_key(step_type)
    }

    fn instantiate(&self, doc: &StepDocument) -> Result<Arc<dyn Step>, ConfigError> {
        let factory = self
            .factories
            .get(&doc.step_type)
            .ok_or_else(|| ConfigError::UnknownStepType {
                step: doc.name.clone(),
                step_type: doc.step_type.clone(),
            })?;
        let step = factory(&doc.name, &doc.config);
        debug!("instantiated step '{}' ({})", doc.name, doc.step_type);
        Ok(step)
    }
}

impl Definition {
    /// Build a definition from a document, resolving step types through
    /// `registry`. Runs the same validation as the builder.
    pub fn from_document(
        doc: &WorkflowDocument,
        registry: &StepRegistry,
    ) -> Result<Definition, ConfigError> {
        let mut builder = Definition::builder(doc.name.clone());
        for step in &doc.steps {
            builder.add_step(registry.instantiate(step)?)?;
        }
        for step in &doc.fallbacks {
            builder.register_step(registry.instantiate(step)?)?;
        }
        for catch in &doc.catches {
            builder.add_catch(&catch.from, &catch.to)?;
        }
        if let Some(secs) = doc.timeout_seconds {
            builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatchDocument;
    use steps::mock::MockStep;
    use steps::{MemoryOrderTable, MemoryPublisher};

    fn order_registry() -> StepRegistry {
        StepRegistry::orders(
            Arc::new(MemoryOrderTable::new()),
            Arc::new(MemoryPublisher::new()),
        )
    }

    fn step_doc(name: &str, step_type: &str) -> StepDocument {
        StepDocument {
            name: name.into(),
            step_type: step_type.into(),
            config: Value::Null,
        }
    }

    #[test]
    fn order_document_builds_expected_definition() {
        let doc = WorkflowDocument::order().unwrap();
        let definition = Definition::from_document(&doc, &order_registry()).unwrap();

        assert_eq!(definition.name(), "order-workflow");
        assert_eq!(
            definition.chain_names(),
            vec!["validate", "process", "save", "notify"]
        );
        assert_eq!(definition.catch_for("validate"), Some("notify"));
        assert!(definition.timeout().is_none());
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let doc = WorkflowDocument {
            name: "bad".into(),
            timeout_seconds: None,
            steps: vec![step_doc("charge", "charge_card")],
            fallbacks: vec![],
            catches: vec![],
        };
        assert!(matches!(
            Definition::from_document(&doc, &order_registry()),
            Err(ConfigError::UnknownStepType { step, step_type })
                if step == "charge" && step_type == "charge_card"
        ));
    }

    #[test]
    fn fallbacks_are_registered_off_chain() {
        let mut registry = StepRegistry::new();
        registry.register("mock", |name, config| {
            Arc::new(MockStep::merging(name, config.clone())) as Arc<dyn Step>
        });
        assert!(registry.contains("mock"));

        let doc = WorkflowDocument {
            name: "with-fallback".into(),
            timeout_seconds: Some(5),
            steps: vec![step_doc("a", "mock"), step_doc("b", "mock")],
            fallbacks: vec![step_doc("alert", "mock")],
            catches: vec![CatchDocument { from: "b".into(), to: "alert".into() }],
        };
        let definition = Definition::from_document(&doc, &registry).unwrap();

        assert_eq!(definition.chain_names(), vec!["a", "b"]);
        assert_eq!(definition.catch_for("b"), Some("alert"));
        assert_eq!(definition.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn document_catch_on_unknown_step_is_rejected() {
        let doc = WorkflowDocument {
            name: "dangling".into(),
            timeout_seconds: None,
            steps: vec![step_doc("validate", "validate_order")],
            fallbacks: vec![],
            catches: vec![CatchDocument { from: "validate".into(), to: "notify".into() }],
        };
        assert!(matches!(
            Definition::from_document(&doc, &order_registry()),
            Err(ConfigError::UnknownStep { side: "to", .. })
        ));
    }
}
