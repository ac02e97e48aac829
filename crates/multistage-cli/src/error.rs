//! Error types for the CLI

use std::path::PathBuf;

use multistage_pod::AggregateError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] multistage_common::Error),

    #[error(transparent)]
    Telemetry(#[from] multistage_common::telemetry::TelemetryError),

    #[error("failed to read test definition {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("{0}")]
    Compile(#[from] AggregateError),
}

impl Error {
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}
