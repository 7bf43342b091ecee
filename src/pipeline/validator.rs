//! Validators
//!
//! A validator is a single named check against a [`Context`]. It is owned
//! by exactly one layer from registration onwards.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::context::Context;
use super::outcome::Outcome;

/// A single check run by a layer.
///
/// Implementations must not mutate shared state the context refers to and
/// may perform external calls (uniqueness lookups, reachability checks).
/// Such calls should honor `budget`, the time left before the evaluation
/// deadline (`None` when unbounded). A check still running when the
/// deadline expires is dropped and reported as a timeout.
pub trait Validator: Send + Sync {
    /// Identity of the validator within its layer
    fn id(&self) -> &str;

    /// Human readable description
    fn description(&self) -> &str {
        ""
    }

    /// Run the check
    fn check<'a>(&'a self, ctx: &'a Context, budget: Option<Duration>) -> BoxFuture<'a, Outcome>;
}

type CheckFn = dyn Fn(&Context) -> Outcome + Send + Sync;

/// Validator backed by a synchronous closure
pub struct FnValidator {
    id: String,
    description: String,
    check: Box<CheckFn>,
}

impl FnValidator {
    /// Create a validator from a closure
    pub fn new<F>(id: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Context) -> Outcome + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: String::new(),
            check: Box::new(check),
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Validator for FnValidator {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn check<'a>(&'a self, ctx: &'a Context, _budget: Option<Duration>) -> BoxFuture<'a, Outcome> {
        let outcome = (self.check)(ctx);
        async move { outcome }.boxed()
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}

/// Validator that requires a context parameter to be present
#[derive(Debug, Clone)]
pub struct RequiredParam {
    id: String,
    key: String,
}

impl RequiredParam {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }
}

impl Validator for RequiredParam {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "requires a named parameter"
    }

    fn check<'a>(&'a self, ctx: &'a Context, _budget: Option<Duration>) -> BoxFuture<'a, Outcome> {
        let outcome = match ctx.param(&self.key) {
            Some(value) if !value.is_null() => Outcome::pass(),
            _ => Outcome::fail_with_code("missing", format!("parameter '{}' is required", self.key)),
        };
        async move { outcome }.boxed()
    }
}
