//! Serialisable workflow documents.
//!
//! A document is the on-disk form of a [`Definition`](crate::Definition). It
//! names step *types*; the [`StepRegistry`](crate::StepRegistry) turns each
//! type into a concrete step when the definition is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

// ---------------------------------------------------------------------------
// StepDocument
// ---------------------------------------------------------------------------

/// A single step entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    /// Unique name within the workflow (referenced by catches).
    pub name: String,
    /// Maps to a factory registered in the `StepRegistry`.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Arbitrary configuration handed to the factory.
    #[serde(default)]
    pub config: serde_json::Value,
}

// ---------------------------------------------------------------------------
// CatchDocument
// ---------------------------------------------------------------------------

/// Route failures of `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchDocument {
    pub from: String,
    pub to: String,
}

// ---------------------------------------------------------------------------
// WorkflowDocument
// ---------------------------------------------------------------------------

/// A complete workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// The main chain, in execution order.
    pub steps: Vec<StepDocument>,
    /// Off-chain steps, only reachable through a catch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<StepDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catches: Vec<CatchDocument>,
}

impl WorkflowDocument {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Document(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Document(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// The bundled order workflow: validate → process → save → notify, with
    /// validation failures rerouted to notify.
    pub fn order() -> Result<Self, ConfigError> {
        Self::from_json(ORDER_WORKFLOW)
    }
}

/// Source of the bundled order workflow.
pub const ORDER_WORKFLOW: &str = include_str!("../../../workflows/order.json");
