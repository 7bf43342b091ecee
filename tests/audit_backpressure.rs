//! Audit Backpressure Tests
//!
//! Auditing must never slow or fail an evaluation:
//! - A full queue drops its oldest record and counts the drop
//! - Results are identical with a saturated or failing audit path
//! - File sink output is one JSON object per line

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tierguard::audit::{
    AuditError, AuditOutcome, AuditRecord, AuditResult, AuditSink, FileAuditSink,
};
use tierguard::pipeline::{Context, Deadline, Engine, ExecutionPolicy, FnValidator, Outcome};

// =============================================================================
// Helper Functions
// =============================================================================

fn engine(capacity: usize) -> Engine {
    let mut builder = Engine::builder();
    builder
        .register_layer("Input", 1, ExecutionPolicy::FailFast)
        .unwrap()
        .register_validator(
            "Input",
            FnValidator::new("NamePresent", |ctx| {
                Outcome::check(ctx.param("name").is_some(), "name missing")
            }),
        )
        .unwrap()
        .register_hierarchy("Standard", ["Input"], None)
        .unwrap()
        .set_default_hierarchy("Standard")
        .with_audit_capacity(capacity);
    builder.build().unwrap()
}

fn named(i: usize) -> Context {
    Context::new("Rename", "user", format!("items/{}", i)).with_param("name", i as u64)
}

/// Sink that refuses every record, counting attempts.
#[derive(Default)]
struct BrokenSink {
    touched: AtomicBool,
}

impl AuditSink for BrokenSink {
    fn append(&self, _record: &AuditRecord) -> AuditResult<()> {
        self.touched.store(true, Ordering::SeqCst);
        Err(AuditError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
    }
}

// =============================================================================
// Drop-Oldest Tests
// =============================================================================

/// Overflowing the queue keeps the newest records.
#[tokio::test]
async fn test_full_queue_drops_oldest() {
    let engine = engine(3);
    let mut ids = Vec::new();

    for i in 0..5 {
        let result = engine.evaluate(&named(i), Deadline::unbounded()).await.unwrap();
        ids.push(result.operation_id);
    }

    let snapshot = engine.metrics_snapshot();
    assert_eq!(snapshot.audit_enqueued, 5);
    assert_eq!(snapshot.audit_dropped, 2);
    assert_eq!(snapshot.audit_queued, 3);

    let kept: Vec<_> = engine.audit().drain().into_iter().map(|r| r.operation_id).collect();
    assert_eq!(kept, ids[2..].to_vec());
}

/// Results do not depend on audit queue pressure.
#[tokio::test]
async fn test_results_unaffected_by_saturation() {
    let roomy = engine(1024);
    let saturated = engine(1);

    for i in 0..50 {
        let ctx = if i % 3 == 0 {
            Context::new("Rename", "user", "items/x")
        } else {
            named(i)
        };

        let a = roomy.evaluate(&ctx, Deadline::unbounded()).await.unwrap();
        let b = saturated.evaluate(&ctx, Deadline::unbounded()).await.unwrap();
        assert_eq!(a.valid, b.valid);
        assert_eq!(a.authority_chain, b.authority_chain);
        assert_eq!(a.error_codes(), b.error_codes());
    }

    assert_eq!(saturated.audit().len(), 1);
    assert_eq!(saturated.metrics_snapshot().audit_dropped, 49);
}

// =============================================================================
// Sink Failure Tests
// =============================================================================

/// A failing sink is counted, never surfaced to the caller.
#[tokio::test]
async fn test_failing_sink_is_isolated() {
    let engine = engine(16);
    let sink = Arc::new(BrokenSink::default());
    let worker = engine.audit().spawn_worker(sink.clone());

    for i in 0..4 {
        let result = engine.evaluate(&named(i), Deadline::unbounded()).await.unwrap();
        assert!(result.valid);
    }
    worker.shutdown().await;

    assert!(sink.touched.load(Ordering::SeqCst));
    let snapshot = engine.metrics_snapshot();
    assert_eq!(snapshot.audit_sink_failures, 4);
    assert_eq!(snapshot.audit_persisted, 0);
    assert_eq!(snapshot.passed, 4);
}

// =============================================================================
// File Sink Tests
// =============================================================================

/// The file sink writes one parseable record per line.
#[tokio::test]
async fn test_file_sink_writes_json_lines() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("audit.jsonl");

    let engine = engine(16);
    let sink = Arc::new(FileAuditSink::open(&path).unwrap());
    let worker = engine.audit().spawn_worker(sink);

    engine.evaluate(&named(1), Deadline::unbounded()).await.unwrap();
    engine
        .evaluate(
            &Context::new("Rename", "user", "items/2"),
            Deadline::after(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    worker.shutdown().await;

    let file = std::fs::File::open(&path).unwrap();
    let records: Vec<AuditRecord> = BufReader::new(file)
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].outcome, AuditOutcome::Passed);
    assert_eq!(records[1].outcome, AuditOutcome::Rejected);
    assert_eq!(records[1].error_codes, vec!["Error.Input.NamePresent"]);
}
