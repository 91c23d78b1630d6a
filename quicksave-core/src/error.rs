//! Error types for Quicksave operations

use crate::identity::{CheckpointId, ReportId};
use thiserror::Error;

/// Lookup failures. Surfaced to the caller as-is, never retried internally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    /// The report does not exist, or is terminal and no longer accepts
    /// autosaves. Callers treat both the same way.
    #[error("Report not found or no longer active: {report_id}")]
    Report { report_id: ReportId },

    #[error("Checkpoint not found: {checkpoint_id} for report {report_id}")]
    Checkpoint {
        report_id: ReportId,
        checkpoint_id: CheckpointId,
    },

    #[error("No checkpoint exists to recover for report {report_id}")]
    NoCheckpoints { report_id: ReportId },
}

/// Caller-input failures. Rejected before any persistence attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed report state: {reason}")]
    MalformedState { reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unknown merge strategy: {value}")]
    UnknownStrategy { value: String },
}

/// Durable-store failures. Retryable by the caller; an identical retried
/// write deduplicates to a no-op, so retry never produces a duplicate
/// checkpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store operation {operation} failed: {reason}")]
    Backend { operation: String, reason: String },

    #[error("Stored checkpoint {checkpoint_id} is corrupt: {reason}")]
    Corrupted {
        checkpoint_id: CheckpointId,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors, raised at construction time only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Quicksave operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AutosaveError {
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl AutosaveError {
    /// True for failures a client should retry with the same payload.
    /// Content-hash deduplication makes such retries idempotent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AutosaveError::Storage(_))
    }
}

/// Result type alias for Quicksave operations.
pub type AutosaveResult<T> = Result<T, AutosaveError>;

// =============================================================================
// TESTS
// =============================================================================
