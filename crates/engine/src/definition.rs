//! Definition building and validation — run this before executing a workflow.
//!
//! Rules enforced:
//! 1. Step names must be unique within the definition.
//! 2. The chain must contain at least one step.
//! 3. Every catch must reference known steps on both sides, at most one catch
//!    per source step, and no step may catch into itself.
//!
//! A built [`Definition`] is immutable. Steps live in a single arena; the
//! chain and the catch table refer to them by index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use steps::Step;

use crate::ConfigError;

/// Immutable, validated description of step order and catch routing.
pub struct Definition {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    index: HashMap<String, usize>,
    chain: Vec<usize>,
    catches: HashMap<usize, usize>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let catches: HashMap<&str, &str> = self
            .catches
            .iter()
            .map(|(from, to)| (self.steps[*from].name(), self.steps[*to].name()))
            .collect();
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("chain", &self.chain_names())
            .field("catches", &catches)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Definition {
    pub fn builder(name: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-definition timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of steps in the main chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false for a built definition.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Names of the main chain, in execution order.
    pub fn chain_names(&self) -> Vec<&str> {
        self.chain.iter().map(|&i| self.steps[i].name()).collect()
    }

    /// Fallback registered for `step`, if any.
    pub fn catch_for(&self, step: &str) -> Option<&str> {
        let from = self.index.get(step)?;
        self.catches.get(from).map(|&to| self.steps[to].name())
    }

    /// Look a step up by name, chain or off-chain.
    pub fn step(&self, name: &str) -> Option<&Arc<dyn Step>> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    // Index-based accessors used by the executor.

    pub(crate) fn chain_at(&self, position: usize) -> Option<usize> {
        self.chain.get(position).copied()
    }

    pub(crate) fn step_at(&self, index: usize) -> &Arc<dyn Step> {
        &self.steps[index]
    }

    pub(crate) fn catch_at(&self, index: usize) -> Option<usize> {
        self.catches.get(&index).copied()
    }
}

/// Builder for [`Definition`].
pub struct DefinitionBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    index: HashMap<String, usize>,
    chain: Vec<usize>,
    catches: HashMap<usize, usize>,
    timeout: Option<Duration>,
}

impl DefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            index: HashMap::new(),
            chain: Vec::new(),
            catches: HashMap::new(),
            timeout: None,
        }
    }

    fn insert(&mut self, step: Arc<dyn Step>) -> Result<usize, ConfigError> {
        let name = step.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateStep(name));
        }
        let slot = self.steps.len();
        self.steps.push(step);
        self.index.insert(name, slot);
        Ok(slot)
    }

    /// Append a step to the chain.
    pub fn add_step(&mut self, step: Arc<dyn Step>) -> Result<&mut Self, ConfigError> {
        let slot = self.insert(step)?;
        self.chain.push(slot);
        Ok(self)
    }

    /// Register a step outside the chain. It is only reachable as a fallback.
    pub fn register_step(&mut self, step: Arc<dyn Step>) -> Result<&mut Self, ConfigError> {
        self.insert(step)?;
        Ok(self)
    }

    /// Route failures of `from` to `to`.
    pub fn add_catch(&mut self, from: &str, to: &str) -> Result<&mut Self, ConfigError> {
        let from_slot = *self.index.get(from).ok_or_else(|| ConfigError::UnknownStep {
            step: from.to_owned(),
            side: "from",
        })?;
        let to_slot = *self.index.get(to).ok_or_else(|| ConfigError::UnknownStep {
            step: to.to_owned(),
            side: "to",
        })?;
        if self.catches.contains_key(&from_slot) {
            return Err(ConfigError::DuplicateCatch(from.to_owned()));
        }
        self.catches.insert(from_slot, to_slot);
        Ok(self)
    }

    /// Override the executor's default timeout for this definition.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Definition, ConfigError> {
        if self.chain.is_empty() {
            return Err(ConfigError::EmptyChain);
        }
        if let Some((&from, _)) = self.catches.iter().find(|(from, to)| from == to) {
            return Err(ConfigError::SelfCatch(self.steps[from].name().to_owned()));
        }

        Ok(Definition {
            name: self.name,
            steps: self.steps,
            index: self.index,
            chain: self.chain,
            catches: self.catches,
            timeout: self.timeout,
        })
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use steps::mock::MockStep;

    fn step(name: &str) -> Arc<dyn Step> {
        Arc::new(MockStep::passthrough(name))
    }

    fn linear(names: &[&str]) -> DefinitionBuilder {
        let mut builder = Definition::builder("test");
        for name in names {
            builder.add_step(step(name)).expect("unique names");
        }
        builder
    }

    #[test]
    fn linear_chain_keeps_insertion_order() {
        let definition = linear(&["a", "b", "c"]).build().expect("should be valid");
        assert_eq!(definition.chain_names(), vec!["a", "b", "c"]);
        assert_eq!(definition.len(), 3);
        assert!(definition.timeout().is_none());
    }

    #[test]
    fn catch_into_chain_step() {
        let mut builder = linear(&["validate", "process", "save", "notify"]);
        builder.add_catch("validate", "notify").unwrap();
        let definition = builder.build().unwrap();

        assert_eq!(definition.catch_for("validate"), Some("notify"));
        assert_eq!(definition.catch_for("process"), None);
    }

    #[test]
    fn catch_into_registered_off_chain_step() {
        let mut builder = linear(&["a", "b"]);
        builder.register_step(step("fallback")).unwrap();
        builder.add_catch("b", "fallback").unwrap();
        let definition = builder.build().unwrap();

        assert_eq!(definition.chain_names(), vec!["a", "b"]);
        assert!(definition.step("fallback").is_some());
        assert_eq!(definition.catch_for("b"), Some("fallback"));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(matches!(
            Definition::builder("empty").build(),
            Err(ConfigError::EmptyChain)
        ));
    }

    #[test]
    fn registered_steps_alone_do_not_make_a_chain() {
        let mut builder = Definition::builder("off-chain-only");
        builder.register_step(step("fallback")).unwrap();
        assert!(matches!(builder.build(), Err(ConfigError::EmptyChain)));
    }

    #[test]
    fn duplicate_step_name_is_rejected() {
        let mut builder = linear(&["a"]);
        assert!(matches!(
            builder.add_step(step("a")),
            Err(ConfigError::DuplicateStep(name)) if name == "a"
        ));
        assert!(matches!(
            builder.register_step(step("a")),
            Err(ConfigError::DuplicateStep(_))
        ));
    }

    #[test]
    fn catch_referencing_missing_step_is_rejected() {
        let mut builder = linear(&["a"]);
        assert!(matches!(
            builder.add_catch("a", "ghost"),
            Err(ConfigError::UnknownStep { step, side: "to" }) if step == "ghost"
        ));
        assert!(matches!(
            builder.add_catch("ghost", "a"),
            Err(ConfigError::UnknownStep { step, side: "from" }) if step == "ghost"
        ));
    }

    #[test]
    fn second_catch_for_same_step_is_rejected() {
        let mut builder = linear(&["a", "b", "c"]);
        builder.add_catch("a", "b").unwrap();
        assert!(matches!(
            builder.add_catch("a", "c"),
            Err(ConfigError::DuplicateCatch(name)) if name == "a"
        ));
    }

    #[test]
    fn self_catch_is_rejected() {
        let mut builder = linear(&["loop"]);
        builder.add_catch("loop", "loop").unwrap();
        assert!(matches!(
            builder.build(),
            Err(ConfigError::SelfCatch(name)) if name == "loop"
        ));
    }

    #[test]
    fn timeout_is_carried_into_definition() {
        let mut builder = linear(&["a"]);
        builder.timeout(Duration::from_secs(5));
        let definition = builder.build().unwrap();
        assert_eq!(definition.timeout(), Some(Duration::from_secs(5)));
    }
}
