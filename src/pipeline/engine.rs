//! Validation engine
//!
//! Composes the selector and the hierarchies, and hands every result to
//! the audit recorder.
//!
//! # Invariants
//!
//! - Configuration is frozen once the engine exists; the only mutation is
//!   whole-value replacement of a named hierarchy.
//! - Auditing never blocks or alters the returned result.
//! - A selection failure is returned before any layer runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::builder::{resolve_hierarchy, PipelineBuilder};
use super::context::{Context, Deadline};
use super::errors::{PipelineError, PipelineResult};
use super::hierarchy::Hierarchy;
use super::layer::Layer;
use super::outcome::FailureKind;
use super::result::ValidationResult;
use super::selector::Selector;
use crate::audit::{AuditRecord, AuditRecorder};
use crate::observability::{MetricsRegistry, MetricsSnapshot};

/// Frozen validation pipeline
#[derive(Debug)]
pub struct Engine {
    layers: HashMap<String, Arc<Layer>>,
    selector: Selector,
    audit: AuditRecorder,
    metrics: MetricsRegistry,
    default_deadline: Duration,
}

impl Engine {
    pub(crate) fn new(
        layers: HashMap<String, Arc<Layer>>,
        selector: Selector,
        audit: AuditRecorder,
        metrics: MetricsRegistry,
        default_deadline: Duration,
    ) -> Self {
        Self {
            layers,
            selector,
            audit,
            metrics,
            default_deadline,
        }
    }

    /// Start registering a new pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Validate one operation.
    ///
    /// Returns `Err` only when no hierarchy can be selected for `ctx`.
    /// Rejections and timeouts are reported inside the result.
    pub async fn evaluate(
        &self,
        ctx: &Context,
        deadline: Deadline,
    ) -> PipelineResult<ValidationResult> {
        self.metrics.increment_evaluations();

        let hierarchy = match self.selector.select(ctx) {
            Ok(hierarchy) => hierarchy,
            Err(e) => {
                self.metrics.increment_configuration_errors();
                error!(
                    code = e.code(),
                    operation_type = %ctx.operation_type,
                    actor_role = %ctx.actor_role,
                    error = %e,
                    "No hierarchy for operation"
                );
                return Err(e);
            }
        };

        let operation_id = Uuid::new_v4();
        let span = info_span!(
            "evaluate",
            operation_id = %operation_id,
            hierarchy = %hierarchy.name()
        );
        let result = hierarchy
            .evaluate_as(operation_id, ctx, deadline)
            .instrument(span)
            .await;

        self.metrics
            .add_layers_evaluated(result.layer_timings.len() as u64);
        match result.kind {
            None => self.metrics.increment_passed(),
            Some(FailureKind::Rejected) => {
                self.metrics.increment_rejected();
                info!(
                    operation_id = %operation_id,
                    hierarchy = %result.hierarchy,
                    failing_layer = result.failing_layer.as_deref().unwrap_or(""),
                    error_codes = ?result.error_codes(),
                    "Operation rejected"
                );
            }
            Some(FailureKind::Timeout) => {
                self.metrics.increment_timed_out();
                warn!(
                    operation_id = %operation_id,
                    hierarchy = %result.hierarchy,
                    failing_layer = result.failing_layer.as_deref().unwrap_or(""),
                    "Operation exceeded its deadline"
                );
            }
        }

        self.audit.record(AuditRecord::from_result(&result));
        Ok(result)
    }

    /// Validate one operation under the configured default deadline
    pub async fn evaluate_default(&self, ctx: &Context) -> PipelineResult<ValidationResult> {
        self.evaluate(ctx, Deadline::after(self.default_deadline))
            .await
    }

    /// Hierarchy that `evaluate` would run for `ctx`
    pub fn select(&self, ctx: &Context) -> PipelineResult<Arc<Hierarchy>> {
        self.selector.select(ctx)
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Current value of a named hierarchy
    pub fn hierarchy(&self, name: &str) -> Option<Arc<Hierarchy>> {
        self.selector.table().get(name)
    }

    /// Registered hierarchy names, sorted
    pub fn hierarchy_names(&self) -> Vec<&str> {
        self.selector.table().names()
    }

    pub fn layer(&self, name: &str) -> Option<Arc<Layer>> {
        self.layers.get(name).cloned()
    }

    /// Swap a registered hierarchy for a new value under the same name.
    ///
    /// Evaluations already running keep the value they selected.
    pub fn replace_hierarchy(&self, hierarchy: Hierarchy) -> PipelineResult<Arc<Hierarchy>> {
        for layer in hierarchy.layers() {
            match self.layers.get(layer.name()) {
                Some(registered) if Arc::ptr_eq(registered, layer) => {}
                _ => return Err(PipelineError::UnknownLayer(layer.name().to_string())),
            }
        }

        let previous = self.selector.table().replace(hierarchy)?;
        info!(hierarchy = %previous.name(), "Hierarchy replaced");
        Ok(previous)
    }

    /// Rebuild a registered hierarchy from registered layer names
    pub fn rebuild_hierarchy<S: AsRef<str>>(
        &self,
        name: &str,
        layer_names: &[S],
    ) -> PipelineResult<Arc<Hierarchy>> {
        if self.hierarchy(name).is_none() {
            return Err(PipelineError::UnknownHierarchy(name.to_string()));
        }
        let hierarchy = resolve_hierarchy(&self.layers, name, layer_names)?;
        self.replace_hierarchy(hierarchy)
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.audit.stats())
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }
}
