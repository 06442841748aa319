//! In-process transport with registered route handlers.
//!
//! Stands in for the sync server in tests and demos: routes are closures,
//! and `publish` pushes event messages straight to subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::{ConnectionSignal, ConnectionState, SubscriberSet, Subscription, Transport};
use crate::auth::AuthToken;
use crate::error::{ClientError, Result};
use crate::protocol::Response;

/// A request as seen by a loopback route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub route: String,
    pub auth_token: String,
    pub data: Value,
}

pub type RouteHandler = Arc<dyn Fn(&RouteRequest) -> Response + Send + Sync>;

pub struct LoopbackTransport {
    auth_token: AuthToken,
    signal: ConnectionSignal,
    routes: RwLock<HashMap<String, RouteHandler>>,
    subscribers: SubscriberSet,
    /// Every request received, in order
    requests: Mutex<Vec<RouteRequest>>,
    refuse_connections: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(auth_token: impl Into<AuthToken>) -> Self {
        Self {
            auth_token: auth_token.into(),
            signal: ConnectionSignal::new(),
            routes: RwLock::new(HashMap::new()),
            subscribers: SubscriberSet::new(),
            requests: Mutex::new(Vec::new()),
            refuse_connections: AtomicBool::new(false),
        }
    }

    /// Registers (or replaces) the handler for `route`.
    pub fn on(
        &self,
        route: impl Into<String>,
        handler: impl Fn(&RouteRequest) -> Response + Send + Sync + 'static,
    ) {
        self.routes.write().insert(route.into(), Arc::new(handler));
    }

    /// Publishes `message` on `channel`. Returns the number of subscribers
    /// that received it.
    pub fn publish(&self, channel: &str, message: Value) -> usize {
        self.subscribers.dispatch(channel, &message)
    }

    /// Makes subsequent `connect` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Simulates the server cutting the connection.
    pub fn drop_connection(&self) {
        tracing::error!("Server cut connection");
        self.subscribers.clear();
        self.signal.set(ConnectionState::Disconnected);
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, route: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.route == route)
            .count()
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        self.subscribers.channels()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.signal.current()
    }

    /// Moves to `target` from a spawned task and waits for the signal.
    async fn transition(&self, interim: ConnectionState, target: ConnectionState) -> Result<()> {
        self.signal.set(interim);
        let signal = self.signal.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            signal.set(target);
        });
        self.signal.wait_for(target).await
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(AuthToken::default())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<()> {
        if self.signal.is_connected() {
            return Ok(());
        }
        if self.refuse_connections.load(Ordering::SeqCst) {
            tracing::error!("Error connecting to server: connection refused");
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        self.transition(ConnectionState::Connecting, ConnectionState::Connected)
            .await?;
        tracing::debug!("Connected to loopback server");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.signal.current() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.subscribers.clear();
        self.transition(ConnectionState::Disconnecting, ConnectionState::Disconnected)
            .await?;
        tracing::debug!("Disconnected from loopback server");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.signal.is_connected()
    }

    async fn request(&self, route: &str, payload: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let request = RouteRequest {
            route: route.to_string(),
            auth_token: self.auth_token.resolve(),
            data: payload,
        };
        self.requests.lock().push(request.clone());

        let handler = self.routes.read().get(route).cloned();
        let response = match handler {
            Some(handler) => handler(&request),
            None => Response::failure(404, format!("Unknown route: {}", route)),
        };
        response.into_result()
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        Ok(self.subscribers.add(channel))
    }
}
