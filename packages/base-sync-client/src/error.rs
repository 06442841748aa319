use base_sync_core::SyncError;
use serde_json::Value;
use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("The transport is not connected. Call connect() first.")]
    NotConnected,

    #[error("Replica is not initialized: no sync in progress or the base was deleted")]
    NotInitialized,

    #[error("Cannot {operation} while session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Remote call failed (status {status_code:?}): {payload}")]
    Remote {
        status_code: Option<u16>,
        payload: Value,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
