//! Error types for the labeler

use crate::serde_canon::CanonicalError;
use thiserror::Error;

/// Errors raised while building a model or labeling an event
#[derive(Error, Debug)]
pub enum LabelerError {
    /// The model configuration is malformed (detected while building)
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The event cannot be evaluated by the model
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A built model broke one of its own invariants
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Canonical serialization error
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LabelerError {
    pub(crate) fn model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub(crate) fn event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for labeler operations
pub type Result<T> = std::result::Result<T, LabelerError>;
