//! Operation Context
//!
//! The per-operation value every validator reads. Built by the caller,
//! never mutated by the pipeline, dropped once the operation completes.
//! Also holds the deadline type shared by a whole evaluation.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

/// Context evaluated by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Kind of operation, e.g. "create_account"
    pub operation_type: String,

    /// Role of the actor requesting the operation
    pub actor_role: String,

    /// Identifier of the targeted resource
    #[serde(default)]
    pub resource: String,

    /// Named parameters supplied with the operation
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl Context {
    /// Create a new context with no parameters
    pub fn new(
        operation_type: impl Into<String>,
        actor_role: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            operation_type: operation_type.into(),
            actor_role: actor_role.into(),
            resource: resource.into(),
            params: HashMap::new(),
        }
    }

    /// Add a named parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get a parameter by name
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Get a string parameter by name
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Deadline attached to a whole evaluation.
///
/// Layers and validators share it; each validator receives whatever budget
/// remains when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline that expires `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    /// Deadline that expires at the given instant
    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Deadline that never expires
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    /// The expiry instant, if bounded
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before expiry. `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has already passed
    pub fn is_expired(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
