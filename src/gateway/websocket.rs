//! Persistent live channel with auth handshake and topic dispatch
//!
//! One gateway instance owns one connection. The instance is constructed
//! explicitly and injected where needed; lifecycle (connect/disconnect)
//! belongs to application startup and teardown, never to module globals.

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use super::messages::AuthFrame;

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Disconnected,
    Connecting,
    Authenticating,
    Open,
    ReconnectWait,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket URL
    pub url: String,
    /// Fixed delay before each reconnect attempt. Deliberately not a
    /// backoff: losing live balance updates costs more than reconnect
    /// traffic at this scale, so the gateway retries forever at this pace.
    pub reconnect_delay: Duration,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(3),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;
type ListenerMap = HashMap<String, Vec<(u64, Listener)>>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerId {
    topic: String,
    id: u64,
}

/// WebSocket gateway for the platform's live channel
pub struct WsGateway {
    config: GatewayConfig,
    /// Present while the session wants a connection; cleared by disconnect.
    /// A close with the token still set schedules a reconnect.
    token: Arc<RwLock<Option<String>>>,
    listeners: Arc<RwLock<ListenerMap>>,
    next_listener_id: AtomicU64,
    state_tx: watch::Sender<GatewayState>,
    // Keep one receiver alive for the gateway's lifetime. `watch::Sender::send`
    // is a no-op (returns Err without updating the value) when there are zero
    // receivers, so without this the state machine's `send` calls would never
    // move `state()` off its initial value unless a caller happened to hold a
    // `subscribe_state()` receiver.
    _state_rx: watch::Receiver<GatewayState>,
    outbound: Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl WsGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(GatewayState::Disconnected);
        Self {
            config,
            token: Arc::new(RwLock::new(None)),
            listeners: Arc::new(RwLock::new(HashMap::new())),
            next_listener_id: AtomicU64::new(1),
            state_tx,
            _state_rx: state_rx,
            outbound: Arc::new(RwLock::new(None)),
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current connection state
    pub fn state(&self) -> GatewayState {
        *self.state_tx.borrow()
    }

    /// Watch the connection state machine
    pub fn subscribe_state(&self) -> watch::Receiver<GatewayState> {
        self.state_tx.subscribe()
    }

    /// Register a listener for a frame type
    ///
    /// All listeners for a topic run synchronously, in subscription order,
    /// on every matching frame.
    pub fn subscribe<F>(&self, topic: &str, listener: F) -> ListenerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .write()
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        ListenerId {
            topic: topic.to_string(),
            id,
        }
    }

    /// Remove a previously registered listener
    pub fn unsubscribe(&self, listener_id: &ListenerId) {
        let mut listeners = self.listeners.write();
        if let Some(list) = listeners.get_mut(&listener_id.topic) {
            list.retain(|(id, _)| *id != listener_id.id);
        }
    }

    /// Connect with the given token and keep the connection alive
    ///
    /// Spawns the connection task; reconnects after a fixed delay for as
    /// long as the token stays set.
    pub fn connect(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Gateway already running, token refreshed");
            return;
        }

        let config = self.config.clone();
        let token = self.token.clone();
        let listeners = self.listeners.clone();
        let state_tx = self.state_tx.clone();
        let outbound = self.outbound.clone();
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();

        tokio::spawn(async move {
            Self::run(config, token, listeners, &state_tx, outbound, shutdown).await;
            running.store(false, Ordering::SeqCst);
            let _ = state_tx.send(GatewayState::Disconnected);
        });
    }

    /// Drop the token and close the socket now; no reconnect follows
    pub fn disconnect(&self) {
        info!("Gateway disconnect requested");
        *self.token.write() = None;
        // notify_one stores a permit, so a disconnect that races the dial
        // still lands on the run loop's next wait point
        self.shutdown.notify_one();
    }

    /// Send a frame if the connection is OPEN; otherwise drop it silently
    ///
    /// Callers must not assume delivery.
    pub fn send<T: Serialize>(&self, message: &T) {
        if self.state() != GatewayState::Open {
            debug!("Gateway not open, dropping outbound frame");
            return;
        }
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Failed to serialize outbound frame");
                return;
            }
        };
        if let Some(tx) = self.outbound.read().as_ref() {
            let _ = tx.send(Message::Text(text));
        }
    }

    async fn run(
        config: GatewayConfig,
        token: Arc<RwLock<Option<String>>>,
        listeners: Arc<RwLock<ListenerMap>>,
        state_tx: &watch::Sender<GatewayState>,
        outbound: Arc<RwLock<Option<mpsc::UnboundedSender<Message>>>>,
        shutdown: Arc<Notify>,
    ) {
        loop {
            let Some(current_token) = token.read().clone() else {
                return;
            };

            let _ = state_tx.send(GatewayState::Connecting);
            info!("Connecting to live channel: {}", config.url);

            let ws_stream = match connect_async(&config.url).await {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    warn!(error = %e, "Live channel connect failed");
                    if Self::wait_reconnect(&config, &token, state_tx, &shutdown).await {
                        continue;
                    }
                    return;
                }
            };

            // A disconnect may have raced the dial
            if token.read().is_none() {
                return;
            }

            let (mut write, mut read) = ws_stream.split();

            // Auth is always the first outbound frame. The server may start
            // pushing before it acknowledges; the dispatcher below does not
            // wait for an ack.
            let _ = state_tx.send(GatewayState::Authenticating);
            let auth = AuthFrame::new(current_token);
            let auth_json = match serde_json::to_string(&auth) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize auth frame");
                    return;
                }
            };
            if let Err(e) = write.send(Message::Text(auth_json)).await {
                warn!(error = %e, "Failed to send auth frame");
                if Self::wait_reconnect(&config, &token, state_tx, &shutdown).await {
                    continue;
                }
                return;
            }

            let _ = state_tx.send(GatewayState::Open);
            info!("Live channel open");

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
            *outbound.write() = Some(out_tx.clone());

            let mut explicit_close = false;
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        // A stored permit from an earlier session is only a
                        // real shutdown if the token is actually gone
                        if token.read().is_none() {
                            info!("Closing live channel");
                            let _ = write.send(Message::Close(None)).await;
                            explicit_close = true;
                            break;
                        }
                    }
                    Some(frame) = out_rx.recv() => {
                        if let Err(e) = write.send(frame).await {
                            warn!(error = %e, "Send on live channel failed");
                            break;
                        }
                    }
                    incoming = read.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                Self::dispatch(&listeners, &text);
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = write.send(Message::Pong(payload)).await;
                            }
                            Some(Ok(Message::Pong(_))) => {}
                            Some(Ok(Message::Close(frame))) => {
                                info!("Live channel closed by server: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Live channel error");
                                break;
                            }
                            None => {
                                info!("Live channel stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            *outbound.write() = None;

            if explicit_close || token.read().is_none() {
                return;
            }
            if !Self::wait_reconnect(&config, &token, state_tx, &shutdown).await {
                return;
            }
        }
    }

    /// Wait out the fixed reconnect delay; false means stop entirely
    async fn wait_reconnect(
        config: &GatewayConfig,
        token: &Arc<RwLock<Option<String>>>,
        state_tx: &watch::Sender<GatewayState>,
        shutdown: &Arc<Notify>,
    ) -> bool {
        if token.read().is_none() {
            return false;
        }
        let _ = state_tx.send(GatewayState::ReconnectWait);
        info!(
            delay_ms = config.reconnect_delay.as_millis() as u64,
            "Scheduling live channel reconnect"
        );
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.notified() => {
                if token.read().is_none() {
                    return false;
                }
            }
        }
        token.read().is_some()
    }

    /// Parse a frame and invoke its topic's listeners in order
    ///
    /// Malformed frames are dropped; the gateway never crashes on input.
    fn dispatch(listeners: &Arc<RwLock<ListenerMap>>, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                return;
            }
        };
        let Some(frame_type) = value.get("type").and_then(|t| t.as_str()) else {
            debug!("Dropping frame without a type field");
            return;
        };

        // Snapshot under the read lock so a listener can re-subscribe
        // without deadlocking.
        let snapshot: Vec<Listener> = listeners
            .read()
            .get(frame_type)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        debug!(frame_type, listeners = snapshot.len(), "Dispatching frame");
        for listener in snapshot {
            listener(&value);
        }
    }
}

impl std::fmt::Debug for WsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsGateway")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}
