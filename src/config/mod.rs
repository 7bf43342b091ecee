//! Pipeline configuration file
//!
//! A JSON document describing layers, hierarchies, selector rules and the
//! default hierarchy. Validators are code and are registered separately.
//!
//! ```json
//! {
//!   "layers": [
//!     {"name": "Input", "priority": 1, "category": "input"},
//!     {"name": "Data", "priority": 3, "policy": "aggregate", "concurrent": true}
//!   ],
//!   "hierarchies": [
//!     {"name": "Standard", "layers": ["Input", "Data"]},
//!     {"name": "Admin", "layers": ["Input"], "rule": {"role_is": "admin"}}
//!   ],
//!   "default_hierarchy": "Standard",
//!   "default_deadline_ms": 500,
//!   "audit": {"queue_capacity": 4096}
//! }
//! ```

mod errors;

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::DEFAULT_QUEUE_CAPACITY;
use crate::pipeline::{HierarchySpec, LayerSpec, DEFAULT_DEADLINE};

pub use errors::{ConfigError, ConfigResult};

/// Audit section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Records held before the oldest is dropped (default 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub layers: Vec<LayerSpec>,

    /// Rules are matched in the order hierarchies are listed
    #[serde(default)]
    pub hierarchies: Vec<HierarchySpec>,

    /// Fallback hierarchy (required)
    pub default_hierarchy: String,

    /// Deadline for evaluations without an explicit one (default 1000)
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,

    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE.as_millis() as u64
}

impl PipelineConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that need no registered validators.
    ///
    /// Layer resolution and priority ordering are checked again when the
    /// pipeline is built.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_hierarchy.is_empty() {
            return Err(ConfigError::invalid("default_hierarchy must not be empty"));
        }

        if self.default_deadline_ms == 0 {
            return Err(ConfigError::invalid("default_deadline_ms must be > 0"));
        }

        if self.audit.queue_capacity == 0 {
            return Err(ConfigError::invalid("audit.queue_capacity must be > 0"));
        }

        let mut layer_names = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                return Err(ConfigError::invalid("layer name must not be empty"));
            }
            if !layer_names.insert(layer.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "layer '{}' is declared twice",
                    layer.name
                )));
            }
        }

        let mut hierarchy_names = HashSet::new();
        for hierarchy in &self.hierarchies {
            if !hierarchy_names.insert(hierarchy.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "hierarchy '{}' is declared twice",
                    hierarchy.name
                )));
            }
            if let Some(missing) = hierarchy
                .layers
                .iter()
                .find(|name| !layer_names.contains(name.as_str()))
            {
                return Err(ConfigError::invalid(format!(
                    "hierarchy '{}' references unknown layer '{}'",
                    hierarchy.name, missing
                )));
            }
        }

        if !hierarchy_names.contains(self.default_hierarchy.as_str()) {
            return Err(ConfigError::invalid(format!(
                "default_hierarchy '{}' is not declared",
                self.default_hierarchy
            )));
        }

        Ok(())
    }

    pub fn default_deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ExecutionPolicy, RuleCondition};

    const MINIMAL: &str = r#"{
        "layers": [{"name": "Input", "priority": 1}],
        "hierarchies": [{"name": "Standard", "layers": ["Input"]}],
        "default_hierarchy": "Standard"
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = PipelineConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.default_deadline_ms, 1000);
        assert_eq!(config.audit.queue_capacity, 1024);
        assert_eq!(config.layers[0].policy, ExecutionPolicy::FailFast);
        assert!(!config.layers[0].concurrent);
        assert!(config.hierarchies[0].rule.is_none());
    }

    #[test]
    fn test_rule_parsed() {
        let config = PipelineConfig::from_json(
            r#"{
                "layers": [{"name": "Input", "priority": 1}],
                "hierarchies": [
                    {"name": "Standard", "layers": ["Input"]},
                    {"name": "Admin", "layers": [], "rule": {"role_in": ["admin", "root"]}}
                ],
                "default_hierarchy": "Standard"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.hierarchies[1].rule,
            Some(RuleCondition::RoleIn(vec!["admin".into(), "root".into()]))
        );
    }

    #[test]
    fn test_missing_default_is_parse_error() {
        let err = PipelineConfig::from_json(r#"{"layers": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.default_deadline_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.audit.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let err = PipelineConfig::from_json(
            r#"{
                "layers": [],
                "hierarchies": [{"name": "Standard", "layers": ["Input"]}],
                "default_hierarchy": "Standard"
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "TIERGUARD_CONFIG_INVALID");
    }

    #[test]
    fn test_undeclared_default_rejected() {
        let mut config = PipelineConfig::from_json(MINIMAL).unwrap();
        config.default_hierarchy = "Other".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/tierguard.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
