use std::path::PathBuf;
use thiserror::Error;

/// Result type for navigator operations
pub type Result<T> = std::result::Result<T, NavigatorError>;

/// Main error type for the navigator crate
#[derive(Debug, Error)]
pub enum NavigatorError {
    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// A batch larger than the replay buffer occupancy was requested
    #[error("Insufficient data: requested a batch of {requested} but only {available} transitions are stored")]
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Invalid action
    #[error("Invalid action {action}: must be less than {num_actions}")]
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// A learner update was requested with no transitions
    #[error("Empty batch: no transitions to train on")]
    EmptyBatch,

    /// Checkpoint written by an incompatible schema version
    #[error("Unsupported checkpoint version {found} (this build reads version {supported})")]
    UnsupportedVersion {
        found: u32,
        supported: u32,
    },

    /// Checkpoint present but unreadable
    #[error("Corrupt checkpoint {}: {reason}", .path.display())]
    CorruptCheckpoint {
        path: PathBuf,
        reason: String,
    },

    /// Failure raised by the environment collaborator
    #[error("Environment error: {0}")]
    Environment(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Helper functions for common error patterns
impl NavigatorError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        NavigatorError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        NavigatorError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
