//! Error types for Treeline.
//!
//! This module provides a unified error type [`TreelineError`] for all
//! Treeline operations, along with a convenient [`Result`] type alias.
//!
//! Caller precondition violations (non-monotonic tree head timestamps,
//! regressions of the contiguous tree size, watch updates removing unknown
//! nodes) are *not* represented here: they are bugs in the calling code and
//! abort the process instead of travelling up the error channel.

use std::io;
use thiserror::Error;

/// Main error type for Treeline operations.
#[derive(Error, Debug)]
pub enum TreelineError {
    #[error("Not found: {0}")]
    NotFound(String),

    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TreelineError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TreelineError::Store(_) | TreelineError::Network(_))
    }
}

impl From<serde_json::Error> for TreelineError {
    fn from(e: serde_json::Error) -> Self {
        TreelineError::Serialization(e.to_string())
    }
}

/// Result type alias for Treeline operations.
pub type Result<T> = std::result::Result<T, TreelineError>;
