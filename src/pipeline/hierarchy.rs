//! Hierarchies
//!
//! A hierarchy is an immutable sequence of layers sorted by ascending
//! priority. Evaluation walks the layers in order and stops at the first
//! failing one; the authority chain is the prefix of layer names up to and
//! including that layer.
//!
//! ## Invariants
//!
//! - Priorities are strictly increasing across a hierarchy.
//! - No layer after the first failing layer is ever evaluated.
//! - A hierarchy with zero layers is vacuously valid.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use super::context::{Context, Deadline};
use super::errors::{PipelineError, PipelineResult};
use super::layer::{Layer, LayerStatus};
use super::outcome::FailureKind;
use super::result::{LayerTiming, ValidationResult};

/// Immutable ordered list of layers defining one validation policy
#[derive(Debug)]
pub struct Hierarchy {
    name: String,
    layers: Vec<Arc<Layer>>,
}

impl Hierarchy {
    /// Build a hierarchy, ordering layers by priority.
    ///
    /// Fails when two layers share a name or a priority.
    pub fn new(name: impl Into<String>, mut layers: Vec<Arc<Layer>>) -> PipelineResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::configuration("hierarchy name must not be empty"));
        }

        for (i, layer) in layers.iter().enumerate() {
            if layers[..i].iter().any(|l| l.name() == layer.name()) {
                return Err(PipelineError::DuplicateLayer(layer.name().to_string()));
            }
        }

        layers.sort_by_key(|layer| layer.priority());

        for pair in layers.windows(2) {
            if pair[0].priority() == pair[1].priority() {
                return Err(PipelineError::DuplicatePriority {
                    hierarchy: name,
                    first: pair[0].name().to_string(),
                    second: pair[1].name().to_string(),
                    priority: pair[0].priority(),
                });
            }
        }

        Ok(Self { name, layers })
    }

    /// A hierarchy with no layers
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layers in evaluation order
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    /// Layer names in evaluation order
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Evaluate the hierarchy under a fresh operation id
    pub async fn evaluate(&self, ctx: &Context, deadline: Deadline) -> ValidationResult {
        self.evaluate_as(Uuid::new_v4(), ctx, deadline).await
    }

    /// Evaluate the hierarchy on behalf of a known operation
    pub async fn evaluate_as(
        &self,
        operation_id: Uuid,
        ctx: &Context,
        deadline: Deadline,
    ) -> ValidationResult {
        let started = Instant::now();
        let timestamp = Utc::now();

        let mut result = ValidationResult {
            operation_id,
            hierarchy: self.name.clone(),
            timestamp,
            valid: true,
            failing_layer: None,
            kind: None,
            failures: Vec::new(),
            authority_chain: Vec::with_capacity(self.layers.len()),
            layer_timings: Vec::with_capacity(self.layers.len()),
            total_duration: Duration::ZERO,
        };

        for layer in &self.layers {
            result.authority_chain.push(layer.name().to_string());

            if deadline.is_expired() {
                // The layer about to start is the one blamed for the timeout
                result.layer_timings.push(LayerTiming {
                    layer: layer.name().to_string(),
                    status: LayerStatus::Timeout,
                    duration: Duration::ZERO,
                });
                result.valid = false;
                result.failing_layer = Some(layer.name().to_string());
                result.kind = Some(FailureKind::Timeout);
                break;
            }

            let outcome = layer.evaluate(ctx, deadline).await;
            result.layer_timings.push(LayerTiming {
                layer: outcome.layer.clone(),
                status: outcome.status,
                duration: outcome.elapsed,
            });

            if !outcome.passed() {
                result.valid = false;
                result.kind = Some(match outcome.status {
                    LayerStatus::Timeout => FailureKind::Timeout,
                    _ => FailureKind::Rejected,
                });
                result.failing_layer = Some(outcome.layer);
                result.failures = outcome.failures;
                break;
            }
        }

        result.total_duration = started.elapsed();
        result
    }
}
