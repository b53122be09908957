//! Error types for reporters.

use thiserror::Error;

/// Errors raised while configuring or running a reporter.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required file path was empty.
    #[error("Invalid path: {0} must not be empty")]
    InvalidPath(&'static str),

    /// The CSV separator was not a single character.
    #[error("Invalid separator: {0:?} is not a single character")]
    InvalidSeparator(String),

    /// Writing an output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a snapshot failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Loading the report configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A blocking output task panicked or was cancelled.
    #[error("Output task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The registry rejected an operation.
    #[error(transparent)]
    Core(#[from] simon_core::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
