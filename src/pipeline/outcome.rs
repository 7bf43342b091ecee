//! Outcomes and error taxonomy
//!
//! Validators answer with an [`Outcome`]. When one fails, the pipeline
//! turns it into a [`ValidatorFailure`] whose error code has the form
//! `Error.<LayerName>.<ValidatorId>`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every pipeline error code
pub const ERROR_CODE_PREFIX: &str = "Error";

/// Answer of a single validator check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the check passed
    pub valid: bool,

    /// Validator-specific detail code (e.g. "taken")
    pub code: Option<String>,

    /// Human readable message
    pub message: Option<String>,
}

impl Outcome {
    /// A passing outcome
    pub fn pass() -> Self {
        Self {
            valid: true,
            code: None,
            message: None,
        }
    }

    /// A failing outcome with a message
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            code: None,
            message: Some(message.into()),
        }
    }

    /// A failing outcome with a detail code and a message
    pub fn fail_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            code: Some(code.into()),
            message: Some(message.into()),
        }
    }

    /// Pass when `condition` holds, otherwise fail with `message`
    pub fn check(condition: bool, message: impl Into<String>) -> Self {
        if condition {
            Self::pass()
        } else {
            Self::fail(message)
        }
    }
}

/// Why a validator (and therefore its layer) failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The validator answered with an invalid outcome
    Rejected,
    /// The deadline expired before the validator or layer finished
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "REJECTED",
            FailureKind::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error category carried by a layer.
///
/// Layer-specific failure kinds are expressed through this tag and the
/// error code string rather than through distinct error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed data
    Input,
    /// Business rule violated
    BusinessRule,
    /// Data disagrees with stored state
    DataConsistency,
    /// System invariant would be broken
    Invariant,
    /// Security or policy refusal
    SecurityPolicy,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "InputError",
            ErrorCategory::BusinessRule => "BusinessRuleError",
            ErrorCategory::DataConsistency => "DataConsistencyError",
            ErrorCategory::Invariant => "InvariantViolation",
            ErrorCategory::SecurityPolicy => "SecurityPolicyError",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format the error code of a failing validator
pub fn error_code(layer: &str, validator_id: &str) -> String {
    format!("{}.{}.{}", ERROR_CODE_PREFIX, layer, validator_id)
}

/// A validator failure as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorFailure {
    /// Layer the validator belongs to
    pub layer: String,

    /// Validator identity within the layer
    pub validator_id: String,

    /// `Error.<LayerName>.<ValidatorId>`
    pub error_code: String,

    /// Rejection or timeout
    pub kind: FailureKind,

    /// Category of the owning layer, if declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,

    /// Validator-supplied detail code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Validator-supplied message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidatorFailure {
    /// Build a failure from a rejected outcome
    pub fn rejected(
        layer: &str,
        validator_id: &str,
        category: Option<ErrorCategory>,
        outcome: Outcome,
    ) -> Self {
        Self {
            layer: layer.to_string(),
            validator_id: validator_id.to_string(),
            error_code: error_code(layer, validator_id),
            kind: FailureKind::Rejected,
            category,
            detail: outcome.code,
            message: outcome.message,
        }
    }

    /// Build a failure for a validator that ran out of time
    pub fn timed_out(layer: &str, validator_id: &str, category: Option<ErrorCategory>) -> Self {
        Self {
            layer: layer.to_string(),
            validator_id: validator_id.to_string(),
            error_code: error_code(layer, validator_id),
            kind: FailureKind::Timeout,
            category,
            detail: None,
            message: Some("deadline exceeded".to_string()),
        }
    }
}
