//! Diagnostic channel for problems that have no caller to return to.
//!
//! Notifications arrive from the network with nobody awaiting them, so
//! anything that goes wrong while processing one is logged and published
//! here instead of being returned.

use tokio::sync::broadcast;

use crate::error::SyncError;
use crate::model::FieldRef;

/// Default number of buffered diagnostics per subscriber.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 256;

/// A problem observed while processing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDiagnostic {
    /// A change could not be decoded or applied and was skipped.
    ChangeSkipped {
        notification: u64,
        index: usize,
        error: SyncError,
    },
    /// Accepted notification numbers jumped; intermediate batches were never seen.
    SequenceGap { expected: u64, received: u64 },
    /// A field's type changed and its options were not refreshed.
    FieldOptionsStale { field: FieldRef },
    /// A snapshot re-fetch for a type change failed.
    ResyncFailed { field: FieldRef, reason: String },
    /// An event message on the change channel was not a notification.
    UndecodableNotification { reason: String },
}

/// Logs diagnostics and fans them out to subscribers.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    tx: broadcast::Sender<SyncDiagnostic>,
}

impl DiagnosticSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns a receiver for diagnostics emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncDiagnostic> {
        self.tx.subscribe()
    }

    /// Logs the diagnostic and publishes it.
    ///
    /// Publishing never fails: with no subscribers the diagnostic is only logged.
    pub fn emit(&self, diagnostic: SyncDiagnostic) {
        match &diagnostic {
            SyncDiagnostic::ChangeSkipped {
                notification,
                index,
                error,
            } => tracing::warn!(
                notification,
                index,
                "Skipping change: {}",
                error
            ),
            SyncDiagnostic::SequenceGap { expected, received } => tracing::warn!(
                expected,
                received,
                "Notification sequence gap, replica may be missing changes"
            ),
            SyncDiagnostic::FieldOptionsStale { field } => tracing::warn!(
                field = %field,
                "Field type changed; options are stale until the next full sync"
            ),
            SyncDiagnostic::ResyncFailed { field, reason } => {
                tracing::error!(field = %field, "Resync failed: {}", reason)
            }
            SyncDiagnostic::UndecodableNotification { reason } => {
                tracing::warn!("Dropping undecodable notification: {}", reason)
            }
        }
        let _ = self.tx.send(diagnostic);
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_CAPACITY)
    }
}
