//! Audit sinks
//!
//! Destinations the drain worker hands records to. Sinks are synchronous
//! and run on the blocking pool, away from the validation path.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::info;

use super::errors::AuditResult;
use super::record::AuditRecord;

/// Destination for drained audit records
pub trait AuditSink: Send + Sync {
    /// Persist or emit one record
    fn append(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Flush buffered records, called after every drained batch
    fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}

/// Append-only JSON lines file
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open or create an audit file
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let line = record.to_json()?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> AuditResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Emits every record as one structured `tracing` event
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let layers = serde_json::to_string(&record.layers)?;
        info!(
            target: "tierguard::audit",
            operation_id = %record.operation_id,
            hierarchy = %record.hierarchy,
            outcome = %record.outcome,
            failing_layer = record.failing_layer.as_deref().unwrap_or(""),
            error_codes = %record.error_codes.join(","),
            total_duration_us = record.total_duration_us,
            layers = %layers,
            "Operation audited"
        );
        Ok(())
    }
}

/// In-memory sink for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
