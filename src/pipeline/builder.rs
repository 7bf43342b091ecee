//! Pipeline registration
//!
//! All registration happens here, before any evaluation is accepted.
//! [`PipelineBuilder::build`] checks the whole configuration and freezes
//! it into an [`Engine`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::Engine;
use super::errors::{PipelineError, PipelineResult};
use super::hierarchy::Hierarchy;
use super::layer::{ExecutionPolicy, Layer};
use super::outcome::ErrorCategory;
use super::selector::{HierarchyTable, RuleCondition, Selector};
use super::validator::Validator;
use crate::audit::{AuditRecorder, DEFAULT_QUEUE_CAPACITY};
use crate::config::PipelineConfig;
use crate::observability::MetricsRegistry;

/// Default deadline applied by `Engine::evaluate_default`
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(1000);

/// Declaration of a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub priority: i32,
    #[serde(default)]
    pub policy: ExecutionPolicy,
    /// Validators of the layer have no data dependency on each other
    #[serde(default)]
    pub concurrent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl LayerSpec {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            policy: ExecutionPolicy::default(),
            concurrent: false,
            category: None,
        }
    }

    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Declaration of a hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchySpec {
    pub name: String,
    /// Layer names; evaluation order follows layer priority
    pub layers: Vec<String>,
    /// Selector rule routing contexts to this hierarchy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleCondition>,
}

struct PendingLayer {
    spec: LayerSpec,
    validators: Vec<Arc<dyn Validator>>,
}

/// Collects layers, validators and hierarchies before freezing them
pub struct PipelineBuilder {
    layers: Vec<PendingLayer>,
    layer_index: HashMap<String, usize>,
    hierarchies: Vec<HierarchySpec>,
    default_hierarchy: Option<String>,
    audit_capacity: usize,
    default_deadline: Duration,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("layers", &self.layers.iter().map(|l| &l.spec).collect::<Vec<_>>())
            .field("hierarchies", &self.hierarchies)
            .field("default_hierarchy", &self.default_hierarchy)
            .field("audit_capacity", &self.audit_capacity)
            .field("default_deadline", &self.default_deadline)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            layer_index: HashMap::new(),
            hierarchies: Vec::new(),
            default_hierarchy: None,
            audit_capacity: DEFAULT_QUEUE_CAPACITY,
            default_deadline: DEFAULT_DEADLINE,
        }
    }

    /// Register the layout described by a configuration file.
    ///
    /// Validators still have to be registered in code afterwards.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let mut builder = Self::new();
        for layer in &config.layers {
            builder.register_layer_spec(layer.clone())?;
        }
        for hierarchy in &config.hierarchies {
            builder.register_hierarchy(
                hierarchy.name.clone(),
                hierarchy.layers.iter().cloned(),
                hierarchy.rule.clone(),
            )?;
        }
        builder
            .set_default_hierarchy(config.default_hierarchy.clone())
            .with_audit_capacity(config.audit.queue_capacity)
            .with_default_deadline(config.default_deadline());
        Ok(builder)
    }

    /// Register a fail-fast or aggregate layer
    pub fn register_layer(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        policy: ExecutionPolicy,
    ) -> PipelineResult<&mut Self> {
        self.register_layer_spec(LayerSpec::new(name, priority).policy(policy))
    }

    /// Register a layer with every option spelled out
    pub fn register_layer_spec(&mut self, spec: LayerSpec) -> PipelineResult<&mut Self> {
        if spec.name.is_empty() {
            return Err(PipelineError::configuration("layer name must not be empty"));
        }
        if self.layer_index.contains_key(&spec.name) {
            return Err(PipelineError::DuplicateLayer(spec.name));
        }

        self.layer_index.insert(spec.name.clone(), self.layers.len());
        self.layers.push(PendingLayer {
            spec,
            validators: Vec::new(),
        });
        Ok(self)
    }

    /// Add a validator to a registered layer; registration order is
    /// execution order
    pub fn register_validator(
        &mut self,
        layer: &str,
        validator: impl Validator + 'static,
    ) -> PipelineResult<&mut Self> {
        self.register_validator_arc(layer, Arc::new(validator))
    }

    pub fn register_validator_arc(
        &mut self,
        layer: &str,
        validator: Arc<dyn Validator>,
    ) -> PipelineResult<&mut Self> {
        let index = *self
            .layer_index
            .get(layer)
            .ok_or_else(|| PipelineError::UnknownLayer(layer.to_string()))?;

        let pending = &mut self.layers[index];
        if pending.validators.iter().any(|v| v.id() == validator.id()) {
            return Err(PipelineError::DuplicateValidator {
                layer: layer.to_string(),
                validator: validator.id().to_string(),
            });
        }
        pending.validators.push(validator);
        Ok(self)
    }

    /// Register a hierarchy over named layers, optionally routed by a rule.
    ///
    /// Rules are matched in the order hierarchies are registered.
    pub fn register_hierarchy<I, S>(
        &mut self,
        name: impl Into<String>,
        layers: I,
        rule: Option<RuleCondition>,
    ) -> PipelineResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if self.hierarchies.iter().any(|h| h.name == name) {
            return Err(PipelineError::DuplicateHierarchy(name));
        }

        self.hierarchies.push(HierarchySpec {
            name,
            layers: layers.into_iter().map(Into::into).collect(),
            rule,
        });
        Ok(self)
    }

    /// Designate the fallback hierarchy
    pub fn set_default_hierarchy(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_hierarchy = Some(name.into());
        self
    }

    /// Bound of the audit queue
    pub fn with_audit_capacity(&mut self, capacity: usize) -> &mut Self {
        self.audit_capacity = capacity;
        self
    }

    /// Deadline used by `Engine::evaluate_default`
    pub fn with_default_deadline(&mut self, deadline: Duration) -> &mut Self {
        self.default_deadline = deadline;
        self
    }

    /// Check the configuration and freeze it
    pub fn build(self) -> PipelineResult<Engine> {
        let mut layers: HashMap<String, Arc<Layer>> = HashMap::with_capacity(self.layers.len());
        for pending in self.layers {
            let mut builder = Layer::builder(pending.spec.name.clone(), pending.spec.priority)
                .policy(pending.spec.policy)
                .concurrent(pending.spec.concurrent);
            if let Some(category) = pending.spec.category {
                builder = builder.category(category);
            }
            for validator in pending.validators {
                builder = builder.validator_arc(validator);
            }
            layers.insert(pending.spec.name, Arc::new(builder.build()?));
        }

        let mut hierarchies = Vec::with_capacity(self.hierarchies.len());
        for spec in &self.hierarchies {
            hierarchies.push(resolve_hierarchy(&layers, &spec.name, &spec.layers)?);
        }

        let table = Arc::new(HierarchyTable::new(hierarchies)?);
        let mut selector = Selector::new(Arc::clone(&table));
        for spec in &self.hierarchies {
            if let Some(rule) = &spec.rule {
                selector.add_rule(spec.name.clone(), rule.clone())?;
            }
        }

        let default = self
            .default_hierarchy
            .ok_or_else(|| PipelineError::configuration("no default hierarchy designated"))?;
        selector.set_default(default)?;

        if self.default_deadline.is_zero() {
            return Err(PipelineError::configuration("default deadline must be > 0"));
        }

        info!(
            layers = layers.len(),
            hierarchies = table.names().len(),
            rules = selector.rules().len(),
            default_hierarchy = selector.default_hierarchy().unwrap_or(""),
            "Pipeline configured"
        );

        Ok(Engine::new(
            layers,
            selector,
            AuditRecorder::new(self.audit_capacity),
            MetricsRegistry::new(),
            self.default_deadline,
        ))
    }
}

/// Build a hierarchy value from registered layers
pub(crate) fn resolve_hierarchy<S: AsRef<str>>(
    layers: &HashMap<String, Arc<Layer>>,
    name: &str,
    layer_names: &[S],
) -> PipelineResult<Hierarchy> {
    let resolved = layer_names
        .iter()
        .map(|layer| {
            layers
                .get(layer.as_ref())
                .cloned()
                .ok_or_else(|| PipelineError::UnknownLayer(layer.as_ref().to_string()))
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    Hierarchy::new(name, resolved)
}
