//! Handling of field type changes.
//!
//! A type change invalidates the field's options, which only a full snapshot
//! carries. The session invokes a [`ResyncStrategy`] once per type change,
//! after the batch that contained it has been published.

use std::sync::Arc;

use async_trait::async_trait;
use base_sync_core::{Base, DiagnosticSink, FieldRef, ReplicaStore, SyncDiagnostic};

use crate::error::Result;
use crate::protocol::StartSyncBaseRequest;
use crate::transport::{send_request, Transport};

/// Fetches a full snapshot of a project's base.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_snapshot(&self, project_id: &str) -> Result<Base>;
}

/// Fetches snapshots through a transport route.
pub struct SnapshotClient<T: Transport> {
    transport: Arc<T>,
    route: String,
}

impl<T: Transport> SnapshotClient<T> {
    pub fn new(transport: Arc<T>, route: impl Into<String>) -> Self {
        Self {
            transport,
            route: route.into(),
        }
    }
}

#[async_trait]
impl<T: Transport> SnapshotFetcher for SnapshotClient<T> {
    async fn fetch_snapshot(&self, project_id: &str) -> Result<Base> {
        let request = StartSyncBaseRequest {
            project_id: project_id.to_string(),
        };
        send_request(self.transport.as_ref(), &self.route, &request).await
    }
}

/// What a strategy can touch.
pub struct ResyncContext<'a> {
    pub project_id: &'a str,
    pub store: &'a ReplicaStore,
    pub diagnostics: &'a DiagnosticSink,
    pub fetcher: &'a dyn SnapshotFetcher,
}

#[async_trait]
pub trait ResyncStrategy: Send + Sync {
    /// Reacts to a type change of `field`.
    ///
    /// An error leaves the replica as published; the session then marks the
    /// field stale and reports `ResyncFailed`.
    async fn resync(&self, ctx: &ResyncContext<'_>, field: &FieldRef) -> Result<()>;
}

/// Keeps the replica and records that the field's options are stale.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkStale;

#[async_trait]
impl ResyncStrategy for MarkStale {
    async fn resync(&self, ctx: &ResyncContext<'_>, field: &FieldRef) -> Result<()> {
        if ctx.store.mark_stale(field.clone()) {
            ctx.diagnostics.emit(SyncDiagnostic::FieldOptionsStale {
                field: field.clone(),
            });
        }
        Ok(())
    }
}

/// Replaces the replica with a freshly fetched snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefetchSnapshot;

#[async_trait]
impl ResyncStrategy for RefetchSnapshot {
    async fn resync(&self, ctx: &ResyncContext<'_>, field: &FieldRef) -> Result<()> {
        tracing::info!(field = %field, "Field type changed, fetching fresh snapshot");
        let base = ctx.fetcher.fetch_snapshot(ctx.project_id).await?;
        ctx.store.replace(base);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use base_sync_core::{Field, FieldType, Table};
    use parking_lot::Mutex;

    struct FixedFetcher {
        result: Mutex<Option<Result<Base>>>,
    }

    #[async_trait]
    impl SnapshotFetcher for FixedFetcher {
        async fn fetch_snapshot(&self, _project_id: &str) -> Result<Base> {
            self.result
                .lock()
                .take()
                .unwrap_or(Err(ClientError::Transport("no snapshot".to_string())))
        }
    }

    fn fresh_base() -> Base {
        Base::new("B1", "fresh").with_table(
            Table::new("T1", "Tasks")
                .with_field(Field::new("F1", "Status", FieldType::SingleSelect)),
        )
    }

    fn field() -> FieldRef {
        FieldRef::new("T1", "F1")
    }

    #[tokio::test]
    async fn test_mark_stale_reports_once() {
        let store = ReplicaStore::new();
        store.replace(fresh_base());
        let diagnostics = DiagnosticSink::new(8);
        let mut rx = diagnostics.subscribe();
        let fetcher = FixedFetcher {
            result: Mutex::new(None),
        };
        let ctx = ResyncContext {
            project_id: "p1",
            store: &store,
            diagnostics: &diagnostics,
            fetcher: &fetcher,
        };

        MarkStale.resync(&ctx, &field()).await.unwrap();
        MarkStale.resync(&ctx, &field()).await.unwrap();

        assert!(store.is_stale(&field()));
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncDiagnostic::FieldOptionsStale { field: field() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refetch_replaces_replica() {
        let store = ReplicaStore::new();
        store.replace(Base::new("B1", "old"));
        store.mark_stale(field());
        let diagnostics = DiagnosticSink::new(8);
        let fetcher = FixedFetcher {
            result: Mutex::new(Some(Ok(fresh_base()))),
        };
        let ctx = ResyncContext {
            project_id: "p1",
            store: &store,
            diagnostics: &diagnostics,
            fetcher: &fetcher,
        };

        RefetchSnapshot.resync(&ctx, &field()).await.unwrap();

        assert_eq!(store.get().unwrap().name, "fresh");
        assert!(store.stale_fields().is_empty());
    }

    #[tokio::test]
    async fn test_refetch_failure_leaves_replica() {
        let store = ReplicaStore::new();
        store.replace(Base::new("B1", "old"));
        let diagnostics = DiagnosticSink::new(8);
        let fetcher = FixedFetcher {
            result: Mutex::new(None),
        };
        let ctx = ResyncContext {
            project_id: "p1",
            store: &store,
            diagnostics: &diagnostics,
            fetcher: &fetcher,
        };

        assert!(RefetchSnapshot.resync(&ctx, &field()).await.is_err());
        assert_eq!(store.get().unwrap().name, "old");
    }
}
