//! Configuration errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "TIERGUARD_CONFIG_READ_ERROR",
            Self::Parse(_) => "TIERGUARD_CONFIG_PARSE_ERROR",
            Self::Invalid(_) => "TIERGUARD_CONFIG_INVALID",
        }
    }
}
