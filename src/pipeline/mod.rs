//! Hierarchical validation pipeline
//!
//! An operation is checked against an ordered stack of layers. Each layer
//! groups validators of one kind; lower priorities are more fundamental
//! and run first. The first failing layer ends evaluation, and the result
//! names every layer that was consulted up to and including it.
//!
//! # Flow
//!
//! ```text
//! Context -> Selector -> Hierarchy -> Layer 1 -> Layer 2 -> ... -> ValidationResult
//!                                                                    |
//!                                                                    v
//!                                                              AuditRecorder
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut builder = Engine::builder();
//! builder
//!     .register_layer("Input", 1, ExecutionPolicy::FailFast)?
//!     .register_validator("Input", RequiredParam::new("EmailPresent", "email"))?
//!     .register_hierarchy("Standard", ["Input"], None)?
//!     .set_default_hierarchy("Standard");
//! let engine = builder.build()?;
//!
//! let result = engine.evaluate(&ctx, Deadline::after(Duration::from_millis(50))).await?;
//! ```

mod builder;
mod context;
mod engine;
mod errors;
mod hierarchy;
mod layer;
mod outcome;
mod result;
mod selector;
mod validator;

pub use builder::{HierarchySpec, LayerSpec, PipelineBuilder, DEFAULT_DEADLINE};
pub use context::{Context, Deadline};
pub use engine::Engine;
pub use errors::{PipelineError, PipelineResult};
pub use hierarchy::Hierarchy;
pub use layer::{ExecutionPolicy, Layer, LayerBuilder, LayerOutcome, LayerStatus};
pub use outcome::{
    error_code, ErrorCategory, FailureKind, Outcome, ValidatorFailure, ERROR_CODE_PREFIX,
};
pub use result::{LayerTiming, ValidationResult};
pub use selector::{HierarchyTable, RuleCondition, Selector, SelectorRule};
pub use validator::{FnValidator, RequiredParam, Validator};
