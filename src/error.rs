//! Error types for clickflow

use thiserror::Error;

/// Errors that can occur while building or analyzing sessions
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to parse session record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Unknown action label in taxonomy: {0}")]
    UnknownActionLabel(String),

    #[error("Text generation failed: {0}")]
    GenerationError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<csv::Error> for SessionError {
    fn from(e: csv::Error) -> Self {
        SessionError::EncodingError(e.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(e: toml::de::Error) -> Self {
        SessionError::ConfigError(e.to_string())
    }
}
