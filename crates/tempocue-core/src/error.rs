//! Core error types for tempocue-core.
//!
//! This module defines the error hierarchy using thiserror. Executor
//! errors are mostly reported through callbacks or logged rather than
//! returned; see [`GuidanceError`].

use std::path::PathBuf;
use thiserror::Error;

use crate::guidance::ExecutorStatus;

/// Core error type for tempocue-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Guidance executor errors
    #[error("Guidance error: {0}")]
    Guidance(#[from] GuidanceError),

    /// Snapshot storage errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the guidance executor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuidanceError {
    /// No cues could be built from the activity configuration.
    #[error("no cues could be built for this activity")]
    PlanEmpty,

    /// Operation is a documented no-op in the current state.
    #[error("'{operation}' has no effect while {status:?}")]
    InvalidTransition {
        operation: &'static str,
        status: ExecutorStatus,
    },

    /// Tick tagged with a session other than the bound one.
    #[error("tick from '{received}' ignored, executor is bound to '{bound}'")]
    StaleTick { bound: String, received: String },

    /// Restore attempted while the executor is running or finished.
    #[error("cannot restore state while {status:?}")]
    RestoreRejected { status: ExecutorStatus },

    /// Snapshot does not belong to the currently loaded plan.
    #[error("snapshot was taken from a plan with {expected} cues, current plan has {actual}")]
    PlanMismatch { expected: usize, actual: usize },

    /// Operation requires a plan loaded via `initialize`.
    #[error("executor has not been initialized")]
    NotInitialized,
}

/// Snapshot persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the snapshot database
    #[error("Failed to open snapshot store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),

    /// Stored blob could not be decoded
    #[error("Corrupt snapshot for session '{session}': {source}")]
    Corrupt {
        session: String,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be encoded
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
