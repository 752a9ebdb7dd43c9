//! Error types for portwatch.
//!
//! Uses `thiserror` for ergonomic error definitions. Only the errors in
//! [`EngineError`] ever reach callers of the scan engine; per-port network
//! conditions are modelled as outcomes, not errors.

use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scan engine to its callers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid port specification: {0}")]
    InvalidPortSpec(#[from] PortError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("scan orchestration failed: {0}")]
    Orchestration(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Shorthand for an unknown job identifier.
    pub fn job_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "scan job",
            id: id.to_string(),
        }
    }

    /// Shorthand for an unknown schedule identifier.
    pub fn schedule_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "schedule",
            id: id.to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the job and schedule stores.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage directory error: {0}")]
    DirectoryError(String),

    #[error("failed to save record: {0}")]
    SaveFailed(String),

    #[error("failed to load record: {0}")]
    LoadFailed(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("ambiguous id prefix '{prefix}': {matches} matches")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directories")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from schedule definition management.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid schedule name: {0}")]
    InvalidName(String),

    #[error("invalid trigger expression: {0}")]
    InvalidTrigger(String),

    #[error("schedule '{0}' already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias for schedule operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Errors reported by the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid job id: {0}")]
    InvalidId(#[from] crate::types::JobIdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
