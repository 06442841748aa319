//! Core synchronization engine for a client-side base replica.
//!
//! Provides the replica data model, the typed change set decoded from wire
//! notifications, the sequence-number gate, the change applier, and the
//! copy-on-write replica store the applier publishes into.

pub mod applier;
pub mod change;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod gate;
pub mod model;
pub mod notification;
pub mod replica;

pub use applier::{apply_change, ApplyOutcome};
pub use change::{
    BaseUpdate, Change, FieldUpdate, Operation, RecordUpdate, ResourceKind, TableUpdate,
    WireAddress, WireChange,
};
pub use diagnostics::{DiagnosticSink, SyncDiagnostic};
pub use engine::{IngestReport, SyncEngine};
pub use error::{Result, SyncError};
pub use gate::{GateDecision, NotificationGate};
pub use model::{Base, Field, FieldRef, FieldType, Record, Table};
pub use notification::{SyncNotification, Timestamp};
pub use replica::ReplicaStore;
