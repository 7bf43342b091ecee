//! Pipeline error types
//!
//! Every error here is a configuration fault: either detected while the
//! pipeline is being registered, or raised synchronously from `evaluate`
//! before any layer runs. Validator rejections and timeouts are never
//! errors; they are carried by the evaluation result.

use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    #[error("Unknown hierarchy: {0}")]
    UnknownHierarchy(String),

    #[error("Layer already registered: {0}")]
    DuplicateLayer(String),

    #[error("Hierarchy already registered: {0}")]
    DuplicateHierarchy(String),

    #[error("Validator '{validator}' already registered in layer '{layer}'")]
    DuplicateValidator { layer: String, validator: String },

    #[error("Layers '{first}' and '{second}' share priority {priority} in hierarchy '{hierarchy}'")]
    DuplicatePriority {
        hierarchy: String,
        first: String,
        second: String,
        priority: i32,
    },

    #[error("No selector rule matched and no default hierarchy is configured")]
    NoHierarchySelected,

    #[error("Invalid selector rule for hierarchy '{hierarchy}': {reason}")]
    InvalidRule { hierarchy: String, reason: String },
}

impl PipelineError {
    /// Create a generic configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "TIERGUARD_CONFIGURATION_ERROR",
            Self::UnknownLayer(_) => "TIERGUARD_UNKNOWN_LAYER",
            Self::UnknownHierarchy(_) => "TIERGUARD_UNKNOWN_HIERARCHY",
            Self::DuplicateLayer(_) => "TIERGUARD_DUPLICATE_LAYER",
            Self::DuplicateHierarchy(_) => "TIERGUARD_DUPLICATE_HIERARCHY",
            Self::DuplicateValidator { .. } => "TIERGUARD_DUPLICATE_VALIDATOR",
            Self::DuplicatePriority { .. } => "TIERGUARD_DUPLICATE_PRIORITY",
            Self::NoHierarchySelected => "TIERGUARD_NO_HIERARCHY_SELECTED",
            Self::InvalidRule { .. } => "TIERGUARD_INVALID_RULE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PipelineError::NoHierarchySelected.code(),
            "TIERGUARD_NO_HIERARCHY_SELECTED"
        );
        assert_eq!(
            PipelineError::UnknownLayer("Input".into()).code(),
            "TIERGUARD_UNKNOWN_LAYER"
        );
    }

    #[test]
    fn test_display_includes_context() {
        let err = PipelineError::DuplicatePriority {
            hierarchy: "Standard".into(),
            first: "Input".into(),
            second: "Syntax".into(),
            priority: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("Standard"));
        assert!(msg.contains("Syntax"));
    }
}
