//! Client library that keeps a local replica of a remote base in sync.
//!
//! A [`SyncSession`] fetches a full snapshot over a [`Transport`], subscribes
//! to the base's change channel, and runs each notification through the
//! [`base_sync_core`] engine before notifying the caller. Project calls are
//! plain request/response wrappers in [`project`].

pub mod auth;
pub mod config;
pub mod error;
pub mod project;
pub mod protocol;
pub mod resync;
pub mod session;
pub mod transport;

pub use auth::AuthToken;
pub use config::{ClientConfig, ResyncMode, SyncOptions};
pub use error::{ClientError, Result};
pub use project::ProjectClient;
pub use resync::{MarkStale, RefetchSnapshot, ResyncStrategy, SnapshotClient, SnapshotFetcher};
pub use session::{SessionState, SyncCallbacks, SyncSession};
pub use transport::{LoopbackTransport, Subscription, TcpTransport, Transport};

pub use base_sync_core;
/// Re-exports from base-sync-core for convenience.
pub use base_sync_core::{Base, FieldRef, IngestReport, SyncDiagnostic, SyncNotification};
