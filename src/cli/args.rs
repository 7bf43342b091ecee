//! CLI argument definitions using clap
//!
//! Commands:
//! - tierguard check --config <path>
//! - tierguard select --config <path> --context <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tierguard - hierarchical validation pipeline
#[derive(Parser, Debug)]
#[command(name = "tierguard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration and print every hierarchy in evaluation order
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./tierguard.json")]
        config: PathBuf,
    },

    /// Print the hierarchy selected for a context
    Select {
        /// Path to configuration file
        #[arg(long, default_value = "./tierguard.json")]
        config: PathBuf,

        /// Path to a JSON context document
        #[arg(long)]
        context: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let cli = Cli::try_parse_from([
            "tierguard",
            "select",
            "--config",
            "pipeline.json",
            "--context",
            "ctx.json",
            "--log-json",
        ])
        .unwrap();

        assert!(cli.log_json);
        match cli.command {
            Command::Select { config, context } => {
                assert_eq!(config, PathBuf::from("pipeline.json"));
                assert_eq!(context, PathBuf::from("ctx.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_check_default_config_path() {
        let cli = Cli::try_parse_from(["tierguard", "check"]).unwrap();
        assert!(!cli.log_json);
        assert!(matches!(
            cli.command,
            Command::Check { config } if config == PathBuf::from("./tierguard.json")
        ));
    }

    #[test]
    fn test_select_requires_context() {
        assert!(Cli::try_parse_from(["tierguard", "select"]).is_err());
    }
}
