//! CLI command implementations
//!
//! Commands only load and inspect configuration. No validator runs, so
//! neither command needs an async runtime.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::config::PipelineConfig;
use crate::observability::{init_logging, LogFormat};
use crate::pipeline::{Context, Engine, Hierarchy, PipelineBuilder};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments, installs logging and dispatches to the command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging(format);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { config } => write_response(check(&config)?),
        Command::Select { config, context } => write_response(select(&config, &context)?),
    }
}

/// Load a configuration and build it into a pipeline
pub fn load_engine(config_path: &Path) -> CliResult<Engine> {
    let config = PipelineConfig::load(config_path)?;
    let engine = PipelineBuilder::from_config(&config)?.build()?;
    info!(config = %config_path.display(), "Configuration loaded");
    Ok(engine)
}

/// Describe every hierarchy of a valid configuration
pub fn check(config_path: &Path) -> CliResult<Value> {
    let engine = load_engine(config_path)?;

    let hierarchies: Vec<Value> = engine
        .hierarchy_names()
        .into_iter()
        .filter_map(|name| engine.hierarchy(name))
        .map(|hierarchy| describe_hierarchy(&hierarchy))
        .collect();

    let rules: Vec<Value> = engine
        .selector()
        .rules()
        .iter()
        .map(|rule| json!({"hierarchy": rule.hierarchy(), "condition": rule.condition()}))
        .collect();

    Ok(json!({
        "default_hierarchy": engine.selector().default_hierarchy(),
        "default_deadline_ms": engine.default_deadline().as_millis() as u64,
        "audit_queue_capacity": engine.audit().capacity(),
        "hierarchies": hierarchies,
        "rules": rules,
    }))
}

/// Name the hierarchy selected for a context document
pub fn select(config_path: &Path, context_path: &Path) -> CliResult<Value> {
    let engine = load_engine(config_path)?;

    let content = fs::read_to_string(context_path).map_err(|e| {
        CliError::context_error(format!(
            "Failed to read context {}: {}",
            context_path.display(),
            e
        ))
    })?;
    let ctx: Context = serde_json::from_str(&content)
        .map_err(|e| CliError::context_error(format!("Invalid context JSON: {}", e)))?;

    let hierarchy = engine.select(&ctx)?;
    Ok(describe_hierarchy(&hierarchy))
}

fn describe_hierarchy(hierarchy: &Hierarchy) -> Value {
    let layers: Vec<Value> = hierarchy
        .layers()
        .iter()
        .map(|layer| {
            json!({
                "name": layer.name(),
                "priority": layer.priority(),
                "policy": layer.policy().as_str(),
                "concurrent": layer.is_concurrent(),
                "category": layer.category().map(|c| c.as_str()),
                "validators": layer.validator_ids(),
            })
        })
        .collect();

    json!({
        "hierarchy": hierarchy.name(),
        "layers": layers,
    })
}
