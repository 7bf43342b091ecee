//! Layers
//!
//! A layer is an immutable, priority-tagged group of validators that are
//! evaluated together under one execution policy.
//!
//! ## Execution
//!
//! - **fail-fast** (default): the first failing validator, in registration
//!   order, is the only one reported.
//! - **aggregate**: every validator runs and every failure is reported, in
//!   registration order.
//!
//! A layer marked `concurrent` runs its validators as concurrent futures.
//! The emitted [`LayerOutcome`] is the same as for sequential execution:
//! in fail-fast mode the layer waits until every validator registered
//! before the lowest failing one has settled, then drops the rest.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use super::context::{Context, Deadline};
use super::errors::{PipelineError, PipelineResult};
use super::outcome::{ErrorCategory, FailureKind, ValidatorFailure};
use super::validator::Validator;

/// How a layer treats multiple failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Stop at the first failing validator
    #[default]
    FailFast,
    /// Run every validator and report all failures
    Aggregate,
}

impl ExecutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPolicy::FailFast => "fail_fast",
            ExecutionPolicy::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an evaluated layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    Passed,
    Failed,
    Timeout,
}

impl LayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerStatus::Passed => "passed",
            LayerStatus::Failed => "failed",
            LayerStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOutcome {
    /// Layer name
    pub layer: String,

    /// Pass, fail or timeout
    pub status: LayerStatus,

    /// Reported failures in registration order
    pub failures: Vec<ValidatorFailure>,

    /// Wall time spent in the layer
    pub elapsed: Duration,
}

impl LayerOutcome {
    /// Whether the layer passed
    pub fn passed(&self) -> bool {
        self.status == LayerStatus::Passed
    }

    /// Ids of the validators that triggered the failure
    pub fn failing_validators(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|f| f.validator_id.as_str())
            .collect()
    }

    fn from_failures(layer: &str, failures: Vec<ValidatorFailure>, elapsed: Duration) -> Self {
        let status = if failures.is_empty() {
            LayerStatus::Passed
        } else if failures.iter().any(|f| f.kind == FailureKind::Timeout) {
            LayerStatus::Timeout
        } else {
            LayerStatus::Failed
        };

        Self {
            layer: layer.to_string(),
            status,
            failures,
            elapsed,
        }
    }
}

/// An immutable group of validators sharing one priority tier
pub struct Layer {
    name: String,
    priority: i32,
    policy: ExecutionPolicy,
    concurrent: bool,
    category: Option<ErrorCategory>,
    validators: Vec<Arc<dyn Validator>>,
}

impl Layer {
    /// Start building a layer
    pub fn builder(name: impl Into<String>, priority: i32) -> LayerBuilder {
        LayerBuilder::new(name, priority)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.category
    }

    /// Validator ids in registration order
    pub fn validator_ids(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.id()).collect()
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Evaluate every validator of the layer against `ctx`
    pub async fn evaluate(&self, ctx: &Context, deadline: Deadline) -> LayerOutcome {
        let started = Instant::now();

        let failures = match (self.concurrent, self.policy) {
            (false, ExecutionPolicy::FailFast) => self.run_sequential(ctx, deadline, true).await,
            (false, ExecutionPolicy::Aggregate) => self.run_sequential(ctx, deadline, false).await,
            (true, ExecutionPolicy::Aggregate) => self.run_concurrent_all(ctx, deadline).await,
            (true, ExecutionPolicy::FailFast) => self.run_concurrent_first(ctx, deadline).await,
        };

        let outcome = LayerOutcome::from_failures(&self.name, failures, started.elapsed());
        debug!(
            layer = %self.name,
            status = %outcome.status,
            failures = outcome.failures.len(),
            elapsed_us = outcome.elapsed.as_micros() as u64,
            "Layer evaluated"
        );
        outcome
    }

    /// Run one validator under the shared deadline.
    ///
    /// A validator is never started once the deadline has passed.
    async fn run_one(
        &self,
        validator: &dyn Validator,
        ctx: &Context,
        deadline: Deadline,
    ) -> Option<ValidatorFailure> {
        if deadline.is_expired() {
            return Some(self.timeout_failure(validator));
        }

        let check = validator.check(ctx, deadline.remaining());
        let outcome = match deadline.instant() {
            Some(at) => match tokio::time::timeout_at(at, check).await {
                Ok(outcome) => outcome,
                Err(_) => return Some(self.timeout_failure(validator)),
            },
            None => check.await,
        };

        // A check that blocked its thread can resolve after the deadline
        if deadline.is_expired() {
            return Some(self.timeout_failure(validator));
        }

        if outcome.valid {
            None
        } else {
            Some(ValidatorFailure::rejected(
                &self.name,
                validator.id(),
                self.category,
                outcome,
            ))
        }
    }

    fn timeout_failure(&self, validator: &dyn Validator) -> ValidatorFailure {
        ValidatorFailure::timed_out(&self.name, validator.id(), self.category)
    }

    async fn run_sequential(
        &self,
        ctx: &Context,
        deadline: Deadline,
        stop_at_first: bool,
    ) -> Vec<ValidatorFailure> {
        let mut failures = Vec::new();
        for validator in &self.validators {
            if let Some(failure) = self.run_one(validator.as_ref(), ctx, deadline).await {
                failures.push(failure);
                if stop_at_first {
                    break;
                }
            }
        }
        failures
    }

    async fn run_concurrent_all(&self, ctx: &Context, deadline: Deadline) -> Vec<ValidatorFailure> {
        let checks = self
            .validators
            .iter()
            .map(|v| self.run_one(v.as_ref(), ctx, deadline));

        // join_all keeps input order, so failures stay in registration order
        join_all(checks).await.into_iter().flatten().collect()
    }

    async fn run_concurrent_first(
        &self,
        ctx: &Context,
        deadline: Deadline,
    ) -> Vec<ValidatorFailure> {
        let mut pending: FuturesUnordered<_> = self
            .validators
            .iter()
            .enumerate()
            .map(|(index, v)| async move { (index, self.run_one(v.as_ref(), ctx, deadline).await) })
            .collect();

        // settled[i] is None until validator i finishes
        let mut settled: Vec<Option<Option<ValidatorFailure>>> =
            (0..self.validators.len()).map(|_| None).collect();
        let mut lowest_failure: Option<usize> = None;

        while let Some((index, result)) = pending.next().await {
            if result.is_some() && lowest_failure.map_or(true, |lowest| index < lowest) {
                lowest_failure = Some(index);
            }
            settled[index] = Some(result);

            if let Some(lowest) = lowest_failure {
                if settled[..lowest].iter().all(Option::is_some) {
                    break;
                }
            }
        }

        // Dropping the set cancels siblings that are still running; their
        // results are never observed.
        drop(pending);

        lowest_failure
            .and_then(|lowest| settled[lowest].take().flatten())
            .into_iter()
            .collect()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("policy", &self.policy)
            .field("concurrent", &self.concurrent)
            .field("category", &self.category)
            .field("validators", &self.validator_ids())
            .finish()
    }
}

/// Builder for [`Layer`]
pub struct LayerBuilder {
    name: String,
    priority: i32,
    policy: ExecutionPolicy,
    concurrent: bool,
    category: Option<ErrorCategory>,
    validators: Vec<Arc<dyn Validator>>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            policy: ExecutionPolicy::default(),
            concurrent: false,
            category: None,
            validators: Vec::new(),
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

    /// Append a validator; registration order is execution order
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append a shared validator
    pub fn validator_arc(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Freeze the layer, rejecting duplicate validator ids
    pub fn build(self) -> PipelineResult<Layer> {
        if self.name.is_empty() {
            return Err(PipelineError::configuration("layer name must not be empty"));
        }

        for (i, validator) in self.validators.iter().enumerate() {
            if self.validators[..i].iter().any(|v| v.id() == validator.id()) {
                return Err(PipelineError::DuplicateValidator {
                    layer: self.name.clone(),
                    validator: validator.id().to_string(),
                });
            }
        }

        Ok(Layer {
            name: self.name,
            priority: self.priority,
            policy: self.policy,
            concurrent: self.concurrent,
            category: self.category,
            validators: self.validators,
        })
    }
}
