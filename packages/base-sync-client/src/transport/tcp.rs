//! TCP transport speaking newline-delimited JSON frames.
//!
//! Each request carries an id; a reader task matches responses to waiting
//! requests through oneshot channels and fans event frames out to
//! subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{ConnectionSignal, ConnectionState, SubscriberSet, Subscription, Transport};
use crate::auth::AuthToken;
use crate::error::{ClientError, Result};
use crate::protocol::Response;

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Request {
        id: u64,
        route: String,
        auth_token: String,
        data: Value,
    },
    Subscribe { channel: String },
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerFrame {
    Response { id: u64, response: Response },
    Event { channel: String, message: Value },
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

pub struct TcpTransport {
    address: String,
    auth_token: AuthToken,
    connect_timeout: Duration,
    signal: ConnectionSignal,
    /// Serializes connect/disconnect
    lifecycle: tokio::sync::Mutex<()>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: PendingMap,
    subscribers: SubscriberSet,
    next_id: AtomicU64,
    /// Set while we are closing the connection ourselves
    closing: Arc<AtomicBool>,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>, auth_token: impl Into<AuthToken>) -> Self {
        Self {
            address: address.into(),
            auth_token: auth_token.into(),
            connect_timeout: Duration::from_secs(10),
            signal: ConnectionSignal::new(),
            lifecycle: tokio::sync::Mutex::new(()),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            subscribers: SubscriberSet::new(),
            next_id: AtomicU64::new(1),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.signal.current()
    }

    /// Receiver notified on every connection state change, including a
    /// server hang-up seen by the reader task.
    pub fn connection_changes(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.signal.subscribe()
    }

    async fn write_frame(&self, frame: &ClientFrame) -> Result<()> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(ClientError::NotConnected)?;
        stream.write_all(&line).await?;
        stream.flush().await?;
        Ok(())
    }

    fn spawn_reader(&self, read_half: OwnedReadHalf) -> JoinHandle<()> {
        let pending = self.pending.clone();
        let subscribers = self.subscribers.clone();
        let signal = self.signal.clone();
        let closing = self.closing.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            let reason = loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ServerFrame>(&line) {
                            Ok(ServerFrame::Response { id, response }) => {
                                let waiter = pending.lock().remove(&id);
                                match waiter {
                                    Some(tx) => {
                                        let _ = tx.send(response);
                                    }
                                    None => tracing::warn!(id, "Response for unknown request"),
                                }
                            }
                            Ok(ServerFrame::Event { channel, message }) => {
                                let delivered = subscribers.dispatch(&channel, &message);
                                tracing::trace!(channel = %channel, delivered, "Event received");
                            }
                            Err(e) => tracing::warn!("Ignoring malformed frame: {}", e),
                        }
                    }
                    Ok(None) => break "connection closed by server".to_string(),
                    Err(e) => break e.to_string(),
                }
            };

            if !closing.load(Ordering::SeqCst) {
                tracing::error!("Server cut connection: {}", reason);
            }
            signal.set(ConnectionState::Disconnected);
            // Dropping the senders fails every in-flight request
            pending.lock().clear();
            subscribers.clear();
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.signal.is_connected() {
            return Ok(());
        }

        self.signal.set(ConnectionState::Connecting);
        tracing::debug!(address = %self.address, "Connecting to server...");
        let stream =
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    tracing::error!("Error connecting to server: {}", e);
                    self.signal.set(ConnectionState::Disconnected);
                    return Err(ClientError::Io(e));
                }
                Err(_) => {
                    tracing::error!("Error connecting to server: timed out");
                    self.signal.set(ConnectionState::Disconnected);
                    return Err(ClientError::Transport(format!(
                        "connect to {} timed out after {:?}",
                        self.address, self.connect_timeout
                    )));
                }
            };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        self.closing.store(false, Ordering::SeqCst);
        *self.writer.lock().await = Some(write_half);
        // Connected before the reader starts, so an immediate hang-up wins.
        self.signal.set(ConnectionState::Connected);
        let handle = self.spawn_reader(read_half);
        *self.reader.lock() = Some(handle);
        tracing::debug!(address = %self.address, "Connected to server.");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.signal.current() == ConnectionState::Disconnected {
            // The reader may have seen the server close; reap it.
            self.writer.lock().await.take();
            self.reader.lock().take();
            return Ok(());
        }

        self.closing.store(true, Ordering::SeqCst);
        self.signal.set(ConnectionState::Disconnecting);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            reader.abort();
            let _ = reader.await;
        }
        self.pending.lock().clear();
        self.subscribers.clear();
        self.signal.set(ConnectionState::Disconnected);
        tracing::debug!(address = %self.address, "Disconnected from server.");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.signal.is_connected()
    }

    async fn request(&self, route: &str, payload: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let frame = ClientFrame::Request {
            id,
            route: route.to_string(),
            auth_token: self.auth_token.resolve(),
            data: payload,
        };
        if let Err(e) = self.write_frame(&frame).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let response = rx.await.map_err(|_| {
            ClientError::Transport(format!("connection closed before response to {}", route))
        })?;
        response.into_result()
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let subscription = self.subscribers.add(channel);
        self.write_frame(&ClientFrame::Subscribe {
            channel: channel.to_string(),
        })
        .await?;
        Ok(subscription)
    }
}
