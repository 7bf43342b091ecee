//! Evaluation result
//!
//! Created by the engine for every evaluated operation, returned to the
//! caller and never retained by the pipeline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::layer::LayerStatus;
use super::outcome::{FailureKind, ValidatorFailure};

/// Timing of one executed layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerTiming {
    pub layer: String,
    pub status: LayerStatus,
    pub duration: Duration,
}

/// Result of evaluating an operation against a hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Operation id attached by the engine
    pub operation_id: Uuid,

    /// Name of the hierarchy that was evaluated
    pub hierarchy: String,

    /// When evaluation started
    pub timestamp: DateTime<Utc>,

    /// Overall validity
    pub valid: bool,

    /// Layer that stopped the evaluation
    pub failing_layer: Option<String>,

    /// Rejection or timeout, when invalid
    pub kind: Option<FailureKind>,

    /// Reported failures of the failing layer
    pub failures: Vec<ValidatorFailure>,

    /// Layer names from the first layer through the failing layer
    /// inclusive, or every layer on success
    pub authority_chain: Vec<String>,

    /// One entry per executed layer, in execution order
    pub layer_timings: Vec<LayerTiming>,

    /// Wall time of the whole evaluation
    pub total_duration: Duration,
}

impl ValidationResult {
    /// Ids of the failing validators
    pub fn failing_validators(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|f| f.validator_id.as_str())
            .collect()
    }

    /// Error codes of the failing validators (`Error.<Layer>.<Validator>`)
    pub fn error_codes(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.error_code.as_str()).collect()
    }

    /// First error code, if any
    pub fn error_code(&self) -> Option<&str> {
        self.failures.first().map(|f| f.error_code.as_str())
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == Some(FailureKind::Timeout)
    }

    /// Status of a layer, if it was executed
    pub fn layer_status(&self, layer: &str) -> Option<LayerStatus> {
        self.layer_timings
            .iter()
            .find(|t| t.layer == layer)
            .map(|t| t.status)
    }
}
