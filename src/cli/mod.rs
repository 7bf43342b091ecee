//! CLI module for tierguard
//!
//! Provides command-line interface for:
//! - check: Validate a configuration file and print its hierarchies
//! - select: Show which hierarchy a context would be evaluated against

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, load_engine, run, run_command, select};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_response, write_response_to};
