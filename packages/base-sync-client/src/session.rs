//! Sync session: snapshot, subscribe, then apply notifications as they arrive.
//!
//! ```text
//! Idle -> Connecting -> Snapshotting -> Syncing -> Stopped
//! ```
//!
//! A session is restarted with a fresh `start_sync`; a stopped session does
//! not resume. Notifications are processed one batch at a time by a single
//! task, so callbacks never observe a half-applied batch.

use std::sync::Arc;

use base_sync_core::{
    Base, DiagnosticSink, FieldRef, IngestReport, SyncDiagnostic, SyncEngine, SyncNotification,
};
use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, ResyncMode, SyncOptions};
use crate::error::{ClientError, Result};
use crate::resync::{
    MarkStale, RefetchSnapshot, ResyncContext, ResyncStrategy, SnapshotClient, SnapshotFetcher,
};
use crate::transport::Transport;

pub type DataCallback = Box<dyn FnMut(&Base) + Send>;
pub type DeltaCallback = Box<dyn FnMut(&SyncNotification) + Send>;

/// Callbacks for one `start_sync` call.
pub struct SyncCallbacks {
    on_data: DataCallback,
    on_delta: Option<DeltaCallback>,
}

impl SyncCallbacks {
    /// `on_data` receives the replica after the snapshot and, unless
    /// `only_once` is set, after every accepted notification.
    pub fn new(on_data: impl FnMut(&Base) + Send + 'static) -> Self {
        Self {
            on_data: Box::new(on_data),
            on_delta: None,
        }
    }

    /// `on_delta` receives every accepted notification.
    pub fn with_delta(
        mut self,
        on_delta: impl FnMut(&SyncNotification) + Send + 'static,
    ) -> Self {
        self.on_delta = Some(Box::new(on_delta));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Snapshotting,
    Syncing,
    Stopped,
}

/// The shareable half of a processor: everything resync needs.
struct Pipeline {
    project_id: String,
    engine: SyncEngine,
    resync: Arc<dyn ResyncStrategy>,
    fetcher: Arc<dyn SnapshotFetcher>,
}

impl Pipeline {
    async fn resync_field(&self, field: &FieldRef) {
        let store = self.engine.store();
        let ctx = ResyncContext {
            project_id: &self.project_id,
            store: store.as_ref(),
            diagnostics: self.engine.diagnostics(),
            fetcher: self.fetcher.as_ref(),
        };
        if let Err(e) = self.resync.resync(&ctx, field).await {
            store.mark_stale(field.clone());
            self.engine.diagnostics().emit(SyncDiagnostic::ResyncFailed {
                field: field.clone(),
                reason: e.to_string(),
            });
        }
    }
}

/// Runs notifications through the engine and fires callbacks.
struct Processor {
    pipeline: Pipeline,
    callbacks: SyncCallbacks,
    only_once: bool,
}

impl Processor {
    fn fire_data(&mut self) {
        if let Some(base) = self.pipeline.engine.store().get() {
            (self.callbacks.on_data)(&base);
        }
    }

    async fn handle_message(&mut self, message: Value) -> Option<IngestReport> {
        match SyncNotification::from_value(message) {
            Ok(notification) => Some(self.process(&notification).await),
            Err(e) => {
                self.pipeline
                    .engine
                    .diagnostics()
                    .emit(SyncDiagnostic::UndecodableNotification {
                        reason: e.to_string(),
                    });
                None
            }
        }
    }

    async fn process(&mut self, notification: &SyncNotification) -> IngestReport {
        let report = self.pipeline.engine.ingest(notification);
        if !report.accepted {
            return report;
        }

        for field in &report.resync {
            self.pipeline.resync_field(field).await;
        }

        if !self.only_once {
            self.fire_data();
        }
        if let Some(on_delta) = self.callbacks.on_delta.as_mut() {
            on_delta(notification);
        }
        report
    }
}

/// Keeps a local replica of one project's base in sync with the server.
pub struct SyncSession<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    resync: Arc<dyn ResyncStrategy>,
    fetcher: Arc<dyn SnapshotFetcher>,
    diagnostics: DiagnosticSink,
    engine: SyncEngine,
    state: Arc<watch::Sender<SessionState>>,
    processor: Option<Arc<Mutex<Processor>>>,
    /// Shutdown signal for the processing task
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: Transport> SyncSession<T> {
    /// Creates an idle session. The resync strategy follows `config.resync`.
    pub fn new(transport: Arc<T>, config: ClientConfig) -> Self {
        let resync: Arc<dyn ResyncStrategy> = match config.resync {
            ResyncMode::MarkStale => Arc::new(MarkStale),
            ResyncMode::Refetch => Arc::new(RefetchSnapshot),
        };
        let fetcher: Arc<dyn SnapshotFetcher> = Arc::new(SnapshotClient::new(
            transport.clone(),
            config.snapshot_route.clone(),
        ));
        let diagnostics = DiagnosticSink::new(config.diagnostics_capacity);
        let engine = SyncEngine::new(diagnostics.clone());
        let (state, _) = watch::channel(SessionState::Idle);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            transport,
            config,
            resync,
            fetcher,
            diagnostics,
            engine,
            state: Arc::new(state),
            processor: None,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Replaces the type-change strategy.
    pub fn with_resync_strategy(mut self, strategy: impl ResyncStrategy + 'static) -> Self {
        self.resync = Arc::new(strategy);
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connects, installs the snapshot of `project_id`'s base, subscribes to
    /// its change channel, and fires the data callback once.
    ///
    /// # Errors
    /// - `ClientError::InvalidState` if a sync is already running
    /// - any transport or remote error from connecting or fetching the
    ///   snapshot; the session is then `Stopped`
    pub async fn start_sync(
        &mut self,
        project_id: &str,
        callbacks: SyncCallbacks,
        options: SyncOptions,
    ) -> Result<()> {
        let current = self.state();
        if !matches!(current, SessionState::Idle | SessionState::Stopped) {
            return Err(ClientError::InvalidState {
                operation: "start sync",
                state: current,
            });
        }

        // A restart never resumes: new gate, new store.
        self.engine = SyncEngine::new(self.diagnostics.clone())
            .with_verbose(options.verbose || self.config.verbose);
        let (shutdown_tx, _) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;

        match self.open(project_id, callbacks, options).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(project = %project_id, "Failed to start sync: {}", e);
                self.engine.store().clear();
                self.set_state(SessionState::Stopped);
                Err(e)
            }
        }
    }

    async fn open(
        &mut self,
        project_id: &str,
        callbacks: SyncCallbacks,
        options: SyncOptions,
    ) -> Result<()> {
        self.set_state(SessionState::Connecting);
        self.transport.connect().await?;

        self.set_state(SessionState::Snapshotting);
        let base = self.fetcher.fetch_snapshot(project_id).await?;
        let channel = self.config.channel_for(&base.id);
        self.engine.install_snapshot(base);

        let mut subscription = self.transport.subscribe(&channel).await?;
        let mut processor = Processor {
            pipeline: Pipeline {
                project_id: project_id.to_string(),
                engine: self.engine.clone(),
                resync: self.resync.clone(),
                fetcher: self.fetcher.clone(),
            },
            callbacks,
            only_once: options.only_once || self.config.data_callback_only_once,
        };
        processor.fire_data();
        let processor = Arc::new(Mutex::new(processor));
        self.processor = Some(processor.clone());

        self.set_state(SessionState::Syncing);
        tracing::info!(project = %project_id, channel = %channel, "Sync started");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let state = self.state.clone();
        let channel_name = channel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = subscription.recv() => match message {
                        Some(message) => {
                            processor.lock().await.handle_message(message).await;
                        }
                        None => {
                            tracing::warn!(channel = %channel_name, "Change channel closed");
                            state.send_replace(SessionState::Stopped);
                            break;
                        }
                    },
                    // A dropped session closes the sender; that is a shutdown too.
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Sync processing task shutting down");
                            break;
                        }
                    }
                }
            }
        });
        self.tasks.push(task);
        Ok(())
    }

    /// Stops processing, disconnects, and drops the replica.
    ///
    /// A batch being processed when this is called finishes first.
    pub async fn stop_sync(&mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self.processor = None;

        let result = self.transport.disconnect().await;
        self.engine.store().clear();
        self.set_state(SessionState::Stopped);
        tracing::info!("Sync stopped");
        result
    }

    /// Returns the current replica.
    ///
    /// # Errors
    /// - `ClientError::NotInitialized` before the snapshot, after
    ///   `stop_sync`, or after the base was deleted
    pub fn base(&self) -> Result<Arc<Base>> {
        self.engine.store().get().ok_or(ClientError::NotInitialized)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Highest notification number accepted so far (0 before any).
    pub fn last_processed(&self) -> u64 {
        self.engine.gate().last_processed()
    }

    /// Fields whose options are stale after a type change.
    pub fn stale_fields(&self) -> Vec<FieldRef> {
        self.engine.store().stale_fields()
    }

    /// Receiver for diagnostics emitted from now on.
    pub fn diagnostics(&self) -> broadcast::Receiver<SyncDiagnostic> {
        self.diagnostics.subscribe()
    }

    /// Processes one notification as if it arrived on the change channel.
    ///
    /// # Errors
    /// - `ClientError::InvalidState` unless the session is syncing
    pub async fn ingest(&self, notification: &SyncNotification) -> Result<IngestReport> {
        let processor = match (&self.processor, self.state()) {
            (Some(processor), SessionState::Syncing) => processor.clone(),
            (_, state) => {
                return Err(ClientError::InvalidState {
                    operation: "ingest",
                    state,
                })
            }
        };
        let mut processor = processor.lock().await;
        Ok(processor.process(notification).await)
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }
}
