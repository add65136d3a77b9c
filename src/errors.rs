//! Error types for the signer pipeline.
//!
//! Three families cover the whole crate:
//!
//! - [`HashError`]: a hash computation failed (the `ComputeFailure` kind).
//! - [`PipelineError`]: a stage, fan-out group or buffer could not complete.
//! - [`ConfigError`]: configuration could not be loaded or validated.
//!
//! The binary converts these into `anyhow::Error` at the edge; library code
//! always returns the typed variants.
//!
//! # Example
//!
//! ```rust
//! use signer::errors::{HashError, PipelineError};
//!
//! let failure = HashError::new("md5", "42", "device overheated");
//! let err = PipelineError::from(failure);
//! assert!(err.is_compute_failure());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// A hash computation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{algorithm} hash failed for input {input:?}: {reason}")]
pub struct HashError {
    /// Name of the algorithm that failed
    pub algorithm: String,
    /// Input that was being hashed
    pub input: String,
    /// Human-readable reason
    pub reason: String,
}

impl HashError {
    pub fn new(
        algorithm: impl Into<String>,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while running a pipeline.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A hash operation failed inside a fan-out group
    #[error("compute failure: {0}")]
    ComputeFailure(#[from] HashError),

    /// The pipeline was aborted; carries the first failure observed
    #[error("pipeline aborted in stage '{stage}': {source}")]
    Aborted {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// A blocking operation observed the cancellation signal
    #[error("operation cancelled")]
    Cancelled,

    /// The reader of an output buffer is gone; the consumer stopped early
    #[error("downstream buffer disconnected")]
    Disconnected,

    /// The OS refused to start a worker thread
    #[error("stage '{stage}' could not spawn a worker: {message}")]
    SpawnFailed { stage: String, message: String },

    /// A stage or fan-out worker panicked
    #[error("stage '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    /// A pipeline was assembled with mismatched stage types
    #[error("type mismatch in pipeline: {0}")]
    TypeMismatch(String),

    /// An internal invariant did not hold
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wrap a failure with the name of the stage it was first seen in.
    pub fn aborted(stage: impl Into<String>, source: PipelineError) -> Self {
        Self::Aborted {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Build a panic error from a `catch_unwind`/join payload.
    pub fn panicked(stage: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::StagePanicked {
            stage: stage.into(),
            message,
        }
    }

    /// Returns true when this error (or its root cause) is a hash failure.
    pub fn is_compute_failure(&self) -> bool {
        match self {
            Self::ComputeFailure(_) => true,
            Self::Aborted { source, .. } => source.is_compute_failure(),
            _ => false,
        }
    }

    /// Build a spawn error from the `io::Error` of a thread builder.
    pub fn spawn_failed(stage: impl Into<String>, err: &std::io::Error) -> Self {
        Self::SpawnFailed {
            stage: stage.into(),
            message: err.to_string(),
        }
    }

    /// Returns true for the secondary error raised by blocked operations
    /// after another component aborted the pipeline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true for errors that are a consequence of something else
    /// stopping the run: a raised cancellation signal or a consumer that
    /// went away. Neither is recorded as the pipeline's failure.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Disconnected)
    }

    /// The innermost error, unwrapping any `Aborted` layers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::Aborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
