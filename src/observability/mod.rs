//! Observability subsystem
//!
//! - Structured logging through `tracing`
//! - Counters describing every evaluation
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on evaluation results
//! 3. Counter updates are lock-free
//!
//! # Usage
//!
//! ```ignore
//! use tierguard::observability::{init_logging, LogFormat};
//!
//! init_logging(LogFormat::Json);
//! let snapshot = engine.metrics_snapshot();
//! ```

mod logger;
mod metrics;

pub use logger::{env_filter, init_logging, LogFormat, DEFAULT_DIRECTIVE};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
