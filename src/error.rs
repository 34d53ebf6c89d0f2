//! Error types for Hearth
//!
//! The taxonomy separates expected states (guard rejections, missing data,
//! unreachable hardware) from genuine faults (store failures, internal errors)
//! so the HTTP layer can pick the right status and logs stay quiet for the
//! former.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Hearth operations
pub type Result<T> = std::result::Result<T, HearthError>;

/// Machine-readable classification shared by every error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GuardRejected,
    Unauthorized,
    Unreachable,
    NotConfigured,
    NoData,
    StoreFailure,
    InvalidInput,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GuardRejected => "guard_rejected",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::NoData => "no_data",
            ErrorKind::StoreFailure => "store_failure",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Failure of a single integration, either live or from its cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Credentials rejected; usually needs a re-auth flow.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transient network failure or timeout.
    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Nothing live and nothing cached.
    #[error("No data: {0}")]
    NoData(String),

    #[error("{0}")]
    Unknown(String),
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Unauthorized(_) => ErrorKind::Unauthorized,
            AdapterError::Unreachable(_) => ErrorKind::Unreachable,
            AdapterError::NotConfigured(_) => ErrorKind::NotConfigured,
            AdapterError::NoData(_) => ErrorKind::NoData,
            AdapterError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Only transient network failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Unreachable(_))
    }

    pub fn timeout(what: &str, after: Duration) -> Self {
        AdapterError::Unreachable(format!("{} timed out after {}ms", what, after.as_millis()))
    }
}

/// A reachability check failed. Recorded as data, never raised to callers
/// of the probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProbeFailure(pub String);

impl ProbeFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A local-only operation was attempted while the process is in public mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GuardError {
    pub operation: String,
    pub message: String,
}

impl GuardError {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        let message = format!(
            "{} is only available when local services are reachable. This deployment is read-only.",
            operation
        );
        Self { operation, message }
    }
}

/// Failure of the durable snapshot store itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot store is not configured")]
    NotConfigured,

    #[error("Snapshot store {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}

/// Main error type for Hearth
#[derive(Error, Debug)]
pub enum HearthError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HearthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HearthError::Guard(_) => ErrorKind::GuardRejected,
            HearthError::Adapter(e) => e.kind(),
            HearthError::Store(StoreError::NotConfigured) => ErrorKind::NotConfigured,
            HearthError::Store(_) => ErrorKind::StoreFailure,
            HearthError::InvalidInput(_) => ErrorKind::InvalidInput,
            HearthError::Config(_) => ErrorKind::NotConfigured,
            HearthError::Io(_) | HearthError::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status for the operator surface
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::GuardRejected => 403,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NoData => 404,
            ErrorKind::Unreachable => 502,
            ErrorKind::NotConfigured => 503,
            ErrorKind::InvalidInput => 400,
            ErrorKind::StoreFailure | ErrorKind::Unknown => 500,
        }
    }

    /// Expected states that should not be logged as faults
    pub fn is_expected(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::GuardRejected | ErrorKind::NoData | ErrorKind::Unreachable
        )
    }
}
