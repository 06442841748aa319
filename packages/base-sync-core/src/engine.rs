//! Synchronous ingest pipeline: gate, then every change of the batch in
//! order, then one atomic publish.

use std::sync::Arc;

use crate::applier::{apply_change, ApplyOutcome};
use crate::change::Change;
use crate::diagnostics::{DiagnosticSink, SyncDiagnostic};
use crate::gate::{GateDecision, NotificationGate};
use crate::model::{Base, FieldRef};
use crate::notification::SyncNotification;
use crate::replica::ReplicaStore;

/// Summary of one `ingest` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub number: u64,
    /// `false` if the gate dropped the notification
    pub accepted: bool,
    /// Changes that modified the replica
    pub applied: usize,
    /// Changes that had nothing to do
    pub ignored: usize,
    /// Changes reported on the diagnostic channel and skipped
    pub skipped: usize,
    /// Fields whose type changed, one entry per such change, in batch order
    pub resync: Vec<FieldRef>,
}

/// Gate, applier and replica store wired together.
///
/// `ingest` never fails: problems with individual changes are contained and
/// reported through the [`DiagnosticSink`].
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: Arc<ReplicaStore>,
    gate: Arc<NotificationGate>,
    diagnostics: DiagnosticSink,
    verbose: bool,
}

impl SyncEngine {
    /// Creates an engine with an empty store and a fresh gate.
    pub fn new(diagnostics: DiagnosticSink) -> Self {
        Self {
            store: Arc::new(ReplicaStore::new()),
            gate: Arc::new(NotificationGate::new()),
            diagnostics,
            verbose: false,
        }
    }

    /// Logs every change at debug level when set.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &Arc<ReplicaStore> {
        &self.store
    }

    pub fn gate(&self) -> &Arc<NotificationGate> {
        &self.gate
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// Installs a full snapshot as the replica.
    pub fn install_snapshot(&self, base: Base) {
        tracing::info!(
            base = %base.id,
            tables = base.tables.len(),
            "Installing snapshot"
        );
        self.store.replace(base);
    }

    /// Runs one notification through the gate and, if accepted, applies all
    /// of its changes in order before publishing the result.
    pub fn ingest(&self, notification: &SyncNotification) -> IngestReport {
        let mut report = IngestReport {
            number: notification.number,
            ..Default::default()
        };

        match self.gate.admit(notification.number) {
            GateDecision::Rejected { last_processed } => {
                tracing::debug!(
                    number = notification.number,
                    last_processed,
                    "Dropping duplicate or stale notification"
                );
                return report;
            }
            GateDecision::Accepted { previous, missed } => {
                if missed > 0 {
                    self.diagnostics.emit(SyncDiagnostic::SequenceGap {
                        expected: previous + 1,
                        received: notification.number,
                    });
                }
            }
        }
        report.accepted = true;

        let mut working = self.store.load_for_update();
        for (index, wire) in notification.changes.iter().enumerate() {
            if self.verbose {
                tracing::debug!(
                    number = notification.number,
                    timestamp = ?notification.timestamp,
                    change = ?wire,
                    "Applying change"
                );
            }
            let result =
                Change::from_wire(wire).and_then(|change| apply_change(&mut working, change));
            match result {
                Ok(ApplyOutcome::Applied) => report.applied += 1,
                Ok(ApplyOutcome::Ignored) => report.ignored += 1,
                Ok(ApplyOutcome::ResyncRequired(field_ref)) => {
                    report.applied += 1;
                    report.resync.push(field_ref);
                }
                Err(error) => {
                    report.skipped += 1;
                    self.diagnostics.emit(SyncDiagnostic::ChangeSkipped {
                        notification: notification.number,
                        index,
                        error,
                    });
                }
            }
        }
        self.store.publish(working);

        tracing::trace!(
            number = report.number,
            applied = report.applied,
            ignored = report.ignored,
            skipped = report.skipped,
            "Notification applied"
        );
        report
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(DiagnosticSink::default())
    }
}
