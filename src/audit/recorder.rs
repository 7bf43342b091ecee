//! Audit recorder
//!
//! A bounded in-memory queue between the engine and the audit sinks.
//!
//! - `record` never waits on I/O and never fails.
//! - When the queue is full the oldest queued record is dropped and the
//!   drop counter is incremented.
//! - An independent worker task drains the queue into a sink; sink faults
//!   are logged and counted, never propagated.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::record::AuditRecord;
use super::sink::AuditSink;

/// Default number of records held before the oldest is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Counters describing the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AuditStats {
    /// Records accepted by `record`
    pub enqueued: u64,
    /// Records evicted because the queue was full
    pub dropped: u64,
    /// Records a sink accepted
    pub persisted: u64,
    /// Records a sink refused
    pub sink_failures: u64,
    /// Records currently queued
    pub queued: usize,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    sink_failures: AtomicU64,
}

impl Shared {
    fn take_all(&self) -> Vec<AuditRecord> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }
}

/// Bounded, drop-oldest audit queue
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    shared: Arc<Shared>,
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl AuditRecorder {
    /// Create a recorder holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                notify: Notify::new(),
                closed: AtomicBool::new(false),
                enqueued: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                persisted: AtomicU64::new(0),
                sink_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueue a record without waiting
    pub fn record(&self, record: AuditRecord) {
        let evicted = {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let evicted = if queue.len() >= self.shared.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(record);
            evicted
        };

        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
        if let Some(evicted) = evicted {
            let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                operation_id = %evicted.operation_id,
                dropped_total = dropped,
                "Audit queue full, dropped oldest record"
            );
        }

        self.shared.notify.notify_one();
    }

    /// Remove and return every queued record, oldest first
    pub fn drain(&self) -> Vec<AuditRecord> {
        self.shared.take_all()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records dropped under overload
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            persisted: self.shared.persisted.load(Ordering::Relaxed),
            sink_failures: self.shared.sink_failures.load(Ordering::Relaxed),
            queued: self.len(),
        }
    }

    /// Start a worker task draining the queue into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_worker(&self, sink: Arc<dyn AuditSink>) -> AuditWorker {
        self.shared.closed.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(drain_loop(shared, sink));

        AuditWorker {
            shared: Arc::clone(&self.shared),
            handle,
        }
    }
}

/// Handle of a running drain worker
#[derive(Debug)]
pub struct AuditWorker {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl AuditWorker {
    /// Flush everything queued so far, then stop the worker
    pub async fn shutdown(self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.notify.notify_one();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Audit worker terminated abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn drain_loop(shared: Arc<Shared>, sink: Arc<dyn AuditSink>) {
    loop {
        let batch = shared.take_all();
        if batch.is_empty() {
            if shared.closed.load(Ordering::SeqCst) {
                break;
            }
            shared.notify.notified().await;
            continue;
        }

        let size = batch.len();
        let batch_sink = Arc::clone(&sink);
        match tokio::task::spawn_blocking(move || persist_batch(batch_sink.as_ref(), batch)).await {
            Ok((persisted, failed)) => {
                shared.persisted.fetch_add(persisted, Ordering::Relaxed);
                shared.sink_failures.fetch_add(failed, Ordering::Relaxed);
                debug!(persisted, failed, "Audit batch drained");
            }
            Err(e) => {
                shared.sink_failures.fetch_add(size as u64, Ordering::Relaxed);
                error!(error = %e, records = size, "Audit sink panicked");
            }
        }
    }
    debug!("Audit worker stopped");
}

fn persist_batch(sink: &dyn AuditSink, batch: Vec<AuditRecord>) -> (u64, u64) {
    let mut persisted = 0;
    let mut failed = 0;

    for record in &batch {
        match sink.append(record) {
            Ok(()) => persisted += 1,
            Err(e) => {
                failed += 1;
                warn!(
                    operation_id = %record.operation_id,
                    code = e.code(),
                    error = %e,
                    "Audit sink rejected record"
                );
            }
        }
    }

    if let Err(e) = sink.flush() {
        warn!(code = e.code(), error = %e, "Audit sink flush failed");
    }

    (persisted, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::errors::{AuditError, AuditResult};
    use crate::audit::record::AuditOutcome;
    use crate::audit::sink::MemoryAuditSink;
    use chrono::Utc;
    use std::io;
    use uuid::Uuid;

    fn record() -> AuditRecord {
        AuditRecord {
            operation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            hierarchy: "Standard".into(),
            layers: Vec::new(),
            total_duration_us: 0,
            outcome: AuditOutcome::Passed,
            failing_layer: None,
            error_codes: Vec::new(),
            authority_chain: Vec::new(),
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn append(&self, _record: &AuditRecord) -> AuditResult<()> {
            Err(AuditError::Io(io::Error::new(io::ErrorKind::Other, "unavailable")))
        }
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let recorder = AuditRecorder::new(2);
        let first = record();
        let second = record();
        let third = record();

        recorder.record(first);
        recorder.record(second.clone());
        recorder.record(third.clone());

        assert_eq!(recorder.dropped(), 1);
        let drained = recorder.drain();
        assert_eq!(drained, vec![second, third]);
        assert!(recorder.is_empty());

        let stats = recorder.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let recorder = AuditRecorder::new(0);
        assert_eq!(recorder.capacity(), 1);
        recorder.record(record());
        recorder.record(record());
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.dropped(), 1);
    }

    #[tokio::test]
    async fn test_worker_drains_into_sink() {
        let recorder = AuditRecorder::new(16);
        let sink = Arc::new(MemoryAuditSink::new());
        let worker = recorder.spawn_worker(sink.clone());

        for _ in 0..5 {
            recorder.record(record());
        }
        worker.shutdown().await;

        assert_eq!(sink.len(), 5);
        assert_eq!(recorder.stats().persisted, 5);
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failures_are_counted_not_raised() {
        let recorder = AuditRecorder::new(16);
        let worker = recorder.spawn_worker(Arc::new(FailingSink));

        recorder.record(record());
        recorder.record(record());
        worker.shutdown().await;

        let stats = recorder.stats();
        assert_eq!(stats.sink_failures, 2);
        assert_eq!(stats.persisted, 0);
    }
}
