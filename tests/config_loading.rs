//! Configuration Loading Tests
//!
//! A configuration file describes the layout; validators are attached in
//! code before the pipeline is built:
//! - Layer options and rules survive loading
//! - Structural faults are reported before any evaluation
//! - Defaults apply when optional sections are missing

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use tierguard::config::{ConfigError, PipelineConfig};
use tierguard::pipeline::{
    Context, ErrorCategory, ExecutionPolicy, FnValidator, Outcome, PipelineBuilder,
    PipelineError,
};

// =============================================================================
// Helper Functions
// =============================================================================

const CONFIG: &str = r#"{
    "layers": [
        {"name": "Input", "priority": 1, "category": "input"},
        {"name": "Business", "priority": 2, "category": "business_rule"},
        {"name": "Security", "priority": 5, "policy": "aggregate", "concurrent": true,
         "category": "security_policy"}
    ],
    "hierarchies": [
        {"name": "Standard", "layers": ["Input", "Business", "Security"]},
        {"name": "Service", "layers": ["Input", "Security"],
         "rule": {"all": [{"role_is": "service"}, {"param_equals": {"key": "signed", "value": true}}]}}
    ],
    "default_hierarchy": "Standard",
    "default_deadline_ms": 250,
    "audit": {"queue_capacity": 64}
}"#;

fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("tierguard.json");
    fs::write(&path, content).unwrap();
    (tmp, path)
}

// =============================================================================
// Loading Tests
// =============================================================================

/// A loaded configuration builds a working pipeline once validators exist.
#[tokio::test]
async fn test_config_builds_pipeline() {
    let (_tmp, path) = write_config(CONFIG);
    let config = PipelineConfig::load(&path).unwrap();

    let mut builder = PipelineBuilder::from_config(&config).unwrap();
    builder
        .register_validator(
            "Security",
            FnValidator::new("TokenScope", |ctx| {
                Outcome::check(ctx.param_str("scope") == Some("write"), "scope missing")
            }),
        )
        .unwrap();
    let engine = builder.build().unwrap();

    assert_eq!(engine.default_deadline(), Duration::from_millis(250));
    assert_eq!(engine.audit().capacity(), 64);

    let security = engine.layer("Security").unwrap();
    assert_eq!(security.policy(), ExecutionPolicy::Aggregate);
    assert!(security.is_concurrent());
    assert_eq!(security.category(), Some(ErrorCategory::SecurityPolicy));

    let result = engine
        .evaluate_default(&Context::new("Write", "user", "docs/1"))
        .await
        .unwrap();
    assert_eq!(result.hierarchy, "Standard");
    assert_eq!(result.error_code(), Some("Error.Security.TokenScope"));
    assert_eq!(result.failures[0].category, Some(ErrorCategory::SecurityPolicy));
}

/// Rules from the file route contexts.
#[test]
fn test_config_rules_route_contexts() {
    let (_tmp, path) = write_config(CONFIG);
    let config = PipelineConfig::load(&path).unwrap();
    let engine = PipelineBuilder::from_config(&config).unwrap().build().unwrap();

    let signed = Context::new("Write", "service", "docs/1").with_param("signed", true);
    let unsigned = Context::new("Write", "service", "docs/1").with_param("signed", false);

    assert_eq!(engine.select(&signed).unwrap().name(), "Service");
    assert_eq!(engine.select(&unsigned).unwrap().name(), "Standard");
}

/// Optional sections fall back to defaults.
#[test]
fn test_defaults_for_optional_sections() {
    let (_tmp, path) = write_config(
        r#"{"hierarchies": [{"name": "Open", "layers": []}], "default_hierarchy": "Open"}"#,
    );
    let config = PipelineConfig::load(&path).unwrap();
    let engine = PipelineBuilder::from_config(&config).unwrap().build().unwrap();

    assert_eq!(engine.default_deadline(), Duration::from_millis(1000));
    assert_eq!(engine.audit().capacity(), 1024);
}

// =============================================================================
// Rejection Tests
// =============================================================================

/// Malformed JSON is a parse error.
#[test]
fn test_malformed_json_rejected() {
    let (_tmp, path) = write_config("{ layers: ");
    assert!(matches!(
        PipelineConfig::load(&path),
        Err(ConfigError::Parse(_))
    ));
}

/// An unknown policy name is a parse error.
#[test]
fn test_unknown_policy_rejected() {
    let (_tmp, path) = write_config(
        r#"{
            "layers": [{"name": "Input", "priority": 1, "policy": "best_effort"}],
            "hierarchies": [{"name": "Standard", "layers": ["Input"]}],
            "default_hierarchy": "Standard"
        }"#,
    );
    assert!(matches!(
        PipelineConfig::load(&path),
        Err(ConfigError::Parse(_))
    ));
}

/// Shared priorities pass file validation but fail the build.
#[test]
fn test_shared_priority_fails_build() {
    let (_tmp, path) = write_config(
        r#"{
            "layers": [{"name": "A", "priority": 3}, {"name": "B", "priority": 3}],
            "hierarchies": [{"name": "Standard", "layers": ["A", "B"]}],
            "default_hierarchy": "Standard"
        }"#,
    );
    let config = PipelineConfig::load(&path).unwrap();

    let err = PipelineBuilder::from_config(&config)
        .unwrap()
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::DuplicatePriority {
            hierarchy: "Standard".into(),
            first: "A".into(),
            second: "B".into(),
            priority: 3,
        }
    );
}

/// A bad pattern in a rule fails the build with the hierarchy named.
#[test]
fn test_bad_rule_pattern_fails_build() {
    let (_tmp, path) = write_config(
        r#"{
            "hierarchies": [
                {"name": "Standard", "layers": []},
                {"name": "Files", "layers": [], "rule": {"resource_matches": "*.txt"}}
            ],
            "default_hierarchy": "Standard"
        }"#,
    );
    let config = PipelineConfig::load(&path).unwrap();

    let err = PipelineBuilder::from_config(&config)
        .unwrap()
        .build()
        .unwrap_err();
    assert_eq!(err.code(), "TIERGUARD_INVALID_RULE");
}
