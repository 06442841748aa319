//! Synchronization error types.

use thiserror::Error;

/// Errors raised while decoding or applying incoming changes.
///
/// None of these abort a notification batch: the engine reports them on the
/// diagnostic channel and moves on to the next change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Change payload is missing a required id or carries an undecodable entity
    #[error("Malformed {operation} {resource} change: {reason}")]
    MalformedChange {
        operation: String,
        resource: String,
        reason: String,
    },

    /// Operation/resource pair outside the known set
    #[error("Unrecognized change: operation '{operation}' on resource '{resource}'")]
    UnrecognizedChange { operation: String, resource: String },

    /// Replica is absent (not yet synced, or the base was deleted)
    #[error("Replica is not initialized")]
    ReplicaAbsent,

    /// Addressed table not present in the replica
    #[error("Table '{table_id}' not found in replica")]
    TableNotFound { table_id: String },

    /// Addressed field not present in its table
    #[error("Field '{field_id}' not found in table '{table_id}'")]
    FieldNotFound { table_id: String, field_id: String },

    /// Addressed record not present in its table
    #[error("Record '{record_id}' not found in table '{table_id}'")]
    RecordNotFound { table_id: String, record_id: String },

    /// Notification or snapshot failed to decode
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
