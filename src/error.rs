//! Error types for Harvest

use std::io;
use thiserror::Error;

/// Result type for Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Errors that can occur in Harvest
#[derive(Debug, Error)]
pub enum HarvestError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A protocol command was rejected by the session
    #[error("Protocol command {command} failed: {message}")]
    Protocol {
        /// Command that was issued (e.g. `Network.getResponseBody`)
        command: String,
        /// Reason reported by the session
        message: String,
    },

    /// Response body could not be decoded
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// `start` called while a recording is already active
    #[error("Recording already in progress")]
    AlreadyRecording,

    /// `stop` called without an active recording
    #[error("No recording in progress")]
    NotRecording,

    /// HAR assembly failed
    #[error("HAR assembly failed: {0}")]
    Assembly(String),
}

impl HarvestError {
    /// Build a protocol error for `command`
    pub fn protocol(command: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
