//! Error taxonomy for the learning loop engine.

use thiserror::Error;

/// The single error type returned by every engine crate.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input fails schema or state-machine rule; surfaced to the caller, never retried.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A session event disallowed from the session's current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Deadline elapsed on an external call.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The external generator returned malformed or schema-invalid data.
    #[error("generation invalid: {0}")]
    GenerationInvalid(String),

    /// Unique constraint or optimistic lock conflict in the store.
    #[error("store conflict: {0}")]
    StoreConflict(String),

    /// Other transient I/O failure, retried per the generator client's policy.
    #[error("transient error: {0}")]
    Transient(String),

    /// Entity lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Transient(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
