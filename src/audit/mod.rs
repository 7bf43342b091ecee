//! Audit subsystem
//!
//! Records the per-layer trace of every evaluated operation.
//!
//! # Principles
//!
//! 1. Recording never blocks or fails the guarded operation
//! 2. The queue is bounded; under overload the oldest record is dropped
//! 3. Sink I/O runs on an independent worker, isolated from evaluation
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tierguard::audit::{FileAuditSink, AuditRecorder};
//!
//! let recorder = AuditRecorder::new(1024);
//! let worker = recorder.spawn_worker(Arc::new(FileAuditSink::open("audit.jsonl")?));
//! // ... evaluate operations ...
//! worker.shutdown().await;
//! ```

mod errors;
mod record;
mod recorder;
mod sink;

pub use errors::{AuditError, AuditResult};
pub use record::{AuditLayerEntry, AuditOutcome, AuditRecord};
pub use recorder::{AuditRecorder, AuditStats, AuditWorker, DEFAULT_QUEUE_CAPACITY};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink, TracingAuditSink};
