//! Request/response and publish/subscribe transport to the sync server.
//!
//! A [`Transport`] connects, sends routed requests carrying the auth token,
//! and delivers event messages for subscribed channels. Connection changes
//! are published on a [`ConnectionSignal`] so `connect`/`disconnect` can
//! await the state they asked for.

pub mod loopback;
pub mod tcp;

pub use loopback::LoopbackTransport;
pub use tcp::TcpTransport;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::{ClientError, Result};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connects and resolves once connected. No-op if already connected.
    async fn connect(&self) -> Result<()>;

    /// Disconnects and resolves once disconnected. No-op if already disconnected.
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Sends `payload` to `route` and returns the `data` of a successful
    /// response.
    ///
    /// # Errors
    /// - `ClientError::NotConnected` if called before `connect`
    /// - `ClientError::Remote` if the server answered with a failure envelope
    async fn request(&self, route: &str, payload: Value) -> Result<Value>;

    /// Starts receiving event messages published on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;
}

/// Sends a typed request and decodes the typed response data.
pub async fn send_request<T, Req, Res>(transport: &T, route: &str, request: &Req) -> Result<Res>
where
    T: Transport + ?Sized,
    Req: Serialize + Sync,
    Res: DeserializeOwned,
{
    let payload = serde_json::to_value(request)?;
    let data = transport.request(route, payload).await?;
    Ok(serde_json::from_value(data)?)
}

/// Stream of raw event messages for one channel.
///
/// `recv` returns `None` once the transport drops the channel (disconnect or
/// lost connection).
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            channel: channel.into(),
            rx,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// Channel name to subscriber senders, shared between a transport and its
/// reader task.
#[derive(Debug, Clone, Default)]
pub struct SubscriberSet {
    inner: Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Value>>>>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber for `channel`.
    pub fn add(&self, channel: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Subscription::new(channel, rx)
    }

    /// Delivers `message` to every live subscriber of `channel` and returns
    /// how many received it. Closed subscribers are pruned.
    pub fn dispatch(&self, channel: &str, message: &Value) -> usize {
        let mut inner = self.inner.lock();
        let Some(senders) = inner.get_mut(channel) else {
            return 0;
        };
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            inner.remove(channel);
        }
        delivered
    }

    pub fn channels(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Drops all senders, ending every subscription.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Watch-based connection state shared by a transport and its tasks.
#[derive(Debug, Clone)]
pub struct ConnectionSignal {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current() == ConnectionState::Connected
    }

    /// Publishes a new state. Returns the previous one.
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        self.tx.send_replace(state)
    }

    /// Resolves once the state equals `target`.
    pub async fn wait_for(&self, target: ConnectionState) -> Result<()> {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Transport("connection state channel closed".to_string()))
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionSignal {
    fn default() -> Self {
        Self::new()
    }
}
