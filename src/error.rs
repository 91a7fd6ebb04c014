//! Error taxonomy for bt
//!
//! Load-time and graph-time errors abort a whole cycle. Stage command failures
//! are not errors at all: they become FAIL records. `AlreadyRecorded` is the
//! benign outcome of two orchestrators racing on the same (revision, stage).

use thiserror::Error;

/// Result type for bt library operations
pub type Result<T> = std::result::Result<T, BtError>;

#[derive(Error, Debug)]
pub enum BtError {
    /// A stage file (or generator output) does not have the stage shape
    #[error("Malformed stage '{stage}': {message}")]
    MalformedStage { stage: String, message: String },

    /// Bad reference between stages (undefined, self-referencing, duplicate)
    #[error("Stage graph error: {0}")]
    Graph(String),

    /// `needs` edges form a cycle
    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// An executable stage file failed to run
    #[error("Generator '{stage}' failed: {message}")]
    Generator {
        stage: String,
        message: String,
        output: String,
    },

    /// A declared result path did not exist after a passing run
    #[error("Stage '{stage}' did not produce declared result '{path}'")]
    MissingResult { stage: String, path: String },

    /// A record already exists for this (revision, stage)
    #[error("Result already recorded for stage '{stage}' at {revision}")]
    AlreadyRecorded { revision: String, stage: String },

    /// Object store operation failed
    #[error("Object store {op} failed: {message}")]
    Store { op: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Stage execution was cancelled before it finished
    #[error("Stage '{0}' was cancelled")]
    Cancelled(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BtError {
    pub(crate) fn store(op: &str, message: impl Into<String>) -> Self {
        BtError::Store {
            op: op.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(stage: &str, message: impl Into<String>) -> Self {
        BtError::MalformedStage {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Errors that mean "someone else already did it" rather than a failure
    pub fn is_benign(&self) -> bool {
        matches!(self, BtError::AlreadyRecorded { .. })
    }
}
