//! Audit records
//!
//! One record per evaluated operation: the per-layer trace with timings and
//! the final outcome, exportable as a structured JSON object.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::AuditResult;
use crate::pipeline::{FailureKind, LayerStatus, ValidationResult};

/// Final outcome of an audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Passed,
    Rejected,
    Timeout,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Passed => "passed",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status and timing of one executed layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLayerEntry {
    pub name: String,
    pub status: LayerStatus,
    pub duration_us: u64,
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub hierarchy: String,
    /// Executed layers in order; layers never reached are absent
    pub layers: Vec<AuditLayerEntry>,
    pub total_duration_us: u64,
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_layer: Option<String>,
    #[serde(default)]
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub authority_chain: Vec<String>,
}

impl AuditRecord {
    /// Build the audit record of an evaluation
    pub fn from_result(result: &ValidationResult) -> Self {
        let outcome = match result.kind {
            None => AuditOutcome::Passed,
            Some(FailureKind::Rejected) => AuditOutcome::Rejected,
            Some(FailureKind::Timeout) => AuditOutcome::Timeout,
        };

        Self {
            operation_id: result.operation_id,
            timestamp: result.timestamp,
            hierarchy: result.hierarchy.clone(),
            layers: result
                .layer_timings
                .iter()
                .map(|t| AuditLayerEntry {
                    name: t.layer.clone(),
                    status: t.status,
                    duration_us: micros(t.duration),
                })
                .collect(),
            total_duration_us: micros(result.total_duration),
            outcome,
            failing_layer: result.failing_layer.clone(),
            error_codes: result.failures.iter().map(|f| f.error_code.clone()).collect(),
            authority_chain: result.authority_chain.clone(),
        }
    }

    /// Status recorded for a layer, if it was executed
    pub fn layer_status(&self, name: &str) -> Option<LayerStatus> {
        self.layers
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.status)
    }

    /// Serialize to a single JSON line
    pub fn to_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{LayerTiming, Outcome, ValidatorFailure};

    fn rejected_result() -> ValidationResult {
        ValidationResult {
            operation_id: Uuid::new_v4(),
            hierarchy: "Standard".into(),
            timestamp: Utc::now(),
            valid: false,
            failing_layer: Some("Business".into()),
            kind: Some(FailureKind::Rejected),
            failures: vec![ValidatorFailure::rejected(
                "Business",
                "UsernameTaken",
                None,
                Outcome::fail("username already exists"),
            )],
            authority_chain: vec!["Input".into(), "Business".into()],
            layer_timings: vec![
                LayerTiming {
                    layer: "Input".into(),
                    status: LayerStatus::Passed,
                    duration: Duration::from_micros(120),
                },
                LayerTiming {
                    layer: "Business".into(),
                    status: LayerStatus::Failed,
                    duration: Duration::from_millis(2),
                },
            ],
            total_duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_record_from_result() {
        let result = rejected_result();
        let record = AuditRecord::from_result(&result);

        assert_eq!(record.operation_id, result.operation_id);
        assert_eq!(record.outcome, AuditOutcome::Rejected);
        assert_eq!(record.layers.len(), 2);
        assert_eq!(record.layers[0].duration_us, 120);
        assert_eq!(record.layer_status("Business"), Some(LayerStatus::Failed));
        assert_eq!(record.error_codes, vec!["Error.Business.UsernameTaken"]);
        assert_eq!(record.total_duration_us, 3000);
    }

    #[test]
    fn test_record_json_shape() {
        let record = AuditRecord::from_result(&rejected_result());
        let json = record.to_json().unwrap();

        assert!(!json.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["outcome"], "rejected");
        assert_eq!(parsed["layers"][0]["name"], "Input");
        assert_eq!(parsed["layers"][0]["status"], "passed");
        assert_eq!(parsed["failing_layer"], "Business");
    }
}
