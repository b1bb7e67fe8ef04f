//! Gateway connection manager
//!
//! Owns the single WebSocket connection, the receive loop, and the
//! bounded reconnection loop. Commands are correlated by id through the
//! correlator; pushed server events fan out through the dispatcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use hermes_core::{CommandEnvelope, Inbound, ResponseEnvelope};

use crate::config::ClientConfig;
use crate::correlator::Correlator;
use crate::dispatcher::{EventDispatcher, EventHandler, LifecycleCallback};
use crate::error::ClientError;

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Client for the gateway's command/response/event protocol.
///
/// Clones share one connection, one pending-command set, and one set of
/// handlers.
#[derive(Clone)]
pub struct GatewayClient {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    connected: AtomicBool,
    authenticated: AtomicBool,
    reconnecting: AtomicBool,
    /// Single-writer discipline: every outbound frame goes through this
    /// lock, however many logical commands are in flight.
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    /// Serializes concurrent connect attempts so at most one receive
    /// loop is ever started per session.
    connect_gate: tokio::sync::Mutex<()>,
    pending: Correlator,
    dispatcher: EventDispatcher,
    on_connect: parking_lot::Mutex<Vec<LifecycleCallback>>,
    on_disconnect: parking_lot::Mutex<Vec<LifecycleCallback>>,
    /// Cancelled by an explicit disconnect; observed by the receive and
    /// reconnection loops at their next suspension point.
    session: parking_lot::Mutex<CancellationToken>,
}

impl GatewayClient {
    pub fn new(config: ClientConfig) -> Self {
        GatewayClient {
            shared: Arc::new(Shared {
                config,
                connected: AtomicBool::new(false),
                authenticated: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                writer: tokio::sync::Mutex::new(None),
                connect_gate: tokio::sync::Mutex::new(()),
                pending: Correlator::default(),
                dispatcher: EventDispatcher::default(),
                on_connect: parking_lot::Mutex::new(Vec::new()),
                on_disconnect: parking_lot::Mutex::new(Vec::new()),
                session: parking_lot::Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Connect to the gateway. A no-op when already connected.
    ///
    /// On failure the bounded reconnection loop has already been
    /// started; the error reports why this attempt failed.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _gate = self.shared.connect_gate.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        log::info!("connecting to gateway at {}", self.shared.config.ws_url);
        let (stream, _) = match connect_async(&self.shared.config.ws_url).await {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("failed to connect to gateway: {e}");
                self.spawn_reconnect();
                return Err(ClientError::Connection(e.to_string()));
            }
        };

        let (writer, reader) = stream.split();
        *self.shared.writer.lock().await = Some(writer);

        let token = CancellationToken::new();
        *self.shared.session.lock() = token.clone();
        self.shared.connected.store(true, Ordering::SeqCst);

        let client = self.clone();
        tokio::spawn(async move {
            client.receive_loop(reader, token).await;
        });

        let callbacks: Vec<_> = self.shared.on_connect.lock().clone();
        for callback in callbacks {
            if let Err(e) = callback().await {
                log::error!("error in connect callback: {e:#}");
            }
        }

        log::info!("connected to gateway");
        Ok(())
    }

    /// Disconnect and cancel all background loops. Idempotent.
    pub async fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.session.lock().cancel();

        let writer = self.shared.writer.lock().await.take();
        if let Some(mut sink) = writer {
            let close_timeout = self.shared.config.close_timeout();
            match tokio::time::timeout(close_timeout, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("error closing gateway connection: {e}"),
                Err(_) => log::debug!("gateway close handshake timed out"),
            }
        }

        let callbacks: Vec<_> = self.shared.on_disconnect.lock().clone();
        for callback in callbacks {
            if let Err(e) = callback().await {
                log::error!("error in disconnect callback: {e:#}");
            }
        }

        log::info!("disconnected from gateway");
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Whether the gateway has signalled `authenticated`.
    ///
    /// Only a `disconnected` event from the gateway clears this flag;
    /// transport-level drops leave it untouched.
    pub fn is_authenticated(&self) -> bool {
        self.shared.authenticated.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its correlated response.
    ///
    /// Responses may arrive in any order; matching is purely by id.
    /// Many commands may be in flight at once.
    pub async fn send_command(
        &self,
        command: &str,
        data: Value,
        timeout: Duration,
    ) -> Result<ResponseEnvelope, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let envelope = CommandEnvelope::new(command, data);
        let text = serde_json::to_string(&envelope)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;

        let slot = self.shared.pending.register(&envelope.id);

        if let Err(e) = self.send_raw(WsMessage::Text(text.into())).await {
            self.shared.pending.remove(&envelope.id);
            log::error!("failed to send command {command}: {e}");
            return Err(e);
        }

        match tokio::time::timeout(timeout, slot).await {
            Ok(Ok(result)) => result,
            // Slot dropped without completion: the session went away.
            Ok(Err(_)) => Err(ClientError::Connection("connection closed".to_string())),
            Err(_) => {
                self.shared.pending.remove(&envelope.id);
                log::error!("command {command} timed out after {timeout:?}");
                Err(ClientError::Timeout)
            }
        }
    }

    pub fn register_event_handler(&self, event: &str, handler: EventHandler) {
        self.shared.dispatcher.register(event, handler);
    }

    pub fn unregister_event_handler(&self, event: &str, handler: &EventHandler) {
        self.shared.dispatcher.unregister(event, handler);
    }

    pub fn on_connect(&self, callback: LifecycleCallback) {
        self.shared.on_connect.lock().push(callback);
    }

    pub fn on_disconnect(&self, callback: LifecycleCallback) {
        self.shared.on_disconnect.lock().push(callback);
    }

    /// Number of commands still waiting for a response.
    pub fn pending_commands(&self) -> usize {
        self.shared.pending.pending_len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    async fn send_raw(&self, message: WsMessage) -> Result<(), ClientError> {
        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => sink
                .send(message)
                .await
                .map_err(|e| ClientError::Connection(e.to_string())),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Reads frames until the transport closes or disconnect is
    /// requested. Also owns keep-alive probing: a ping every interval,
    /// with a bounded wait for the pong.
    async fn receive_loop(self, mut reader: WsReader, token: CancellationToken) {
        let mut ping_tick = tokio::time::interval(self.shared.config.ping_interval());
        ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; pings should start
        // one interval after connect.
        ping_tick.tick().await;

        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = token.cancelled() => return,

                _ = ping_tick.tick() => {
                    if self.send_raw(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        self.handle_transport_close("ping write failed").await;
                        return;
                    }
                    pong_deadline.get_or_insert(Instant::now() + self.shared.config.ping_timeout());
                }

                _ = deadline_elapsed(pong_deadline) => {
                    self.handle_transport_close("pong timeout").await;
                    return;
                }

                frame = reader.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text).await,
                        Some(Ok(WsMessage::Ping(data))) => {
                            if self.send_raw(WsMessage::Pong(data)).await.is_err() {
                                log::warn!("failed to answer gateway ping");
                            }
                        }
                        Some(Ok(WsMessage::Pong(_))) => pong_deadline = None,
                        Some(Ok(WsMessage::Close(_))) | None => {
                            self.handle_transport_close("connection closed").await;
                            return;
                        }
                        // Binary frames are not part of the protocol.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.handle_transport_close(&format!("read error: {e}")).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, text: &str) {
        let inbound: Inbound = match serde_json::from_str(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                log::error!("failed to parse gateway frame: {e}");
                return;
            }
        };

        match inbound {
            Inbound::Response(envelope) => {
                let id = envelope.id.clone();
                if !self.shared.pending.resolve(&id, envelope) {
                    log::debug!("dropping response for unknown command id {id}");
                }
            }
            Inbound::Error(envelope) => {
                let rejected = self
                    .shared
                    .pending
                    .reject(&envelope.id, ClientError::Remote(envelope.error));
                if !rejected {
                    log::debug!("dropping error for unknown command id {}", envelope.id);
                }
            }
            Inbound::Event(envelope) => {
                // The flag mutates whether or not a handler is registered.
                match envelope.event.as_str() {
                    "authenticated" => self.shared.authenticated.store(true, Ordering::SeqCst),
                    "disconnected" => self.shared.authenticated.store(false, Ordering::SeqCst),
                    _ => {}
                }

                let payload = Value::Object(envelope.payload);
                self.shared.dispatcher.dispatch(&envelope.event, &payload).await;
            }
        }
    }

    /// Transport-level loss: sweep pending commands and start the
    /// reconnection loop. `authenticated` stays as-is; only an explicit
    /// `disconnected` event from the gateway clears it.
    async fn handle_transport_close(&self, reason: &str) {
        log::warn!("gateway connection lost: {reason}");
        self.shared.connected.store(false, Ordering::SeqCst);
        *self.shared.writer.lock().await = None;

        self.shared
            .pending
            .reject_all(&ClientError::Connection("connection closed".to_string()));

        self.spawn_reconnect();
    }

    /// Start the reconnection loop unless one is already running.
    fn spawn_reconnect(&self) {
        if self
            .shared
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let client = self.clone();
        let token = self.shared.session.lock().clone();
        tokio::spawn(async move {
            client.run_reconnect(token).await;
            client.shared.reconnecting.store(false, Ordering::SeqCst);
        });
    }

    async fn run_reconnect(&self, token: CancellationToken) {
        let max_attempts = self.shared.config.max_reconnect_attempts;
        let mut attempt = 0;

        while attempt < max_attempts && !self.is_connected() {
            attempt += 1;
            log::info!("reconnecting to gateway (attempt {attempt}/{max_attempts})");

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(self.shared.config.reconnect_interval()) => {}
            }

            if self.connect().await.is_ok() {
                log::info!("reconnected to gateway after {attempt} attempts");
                return;
            }
        }

        if !self.is_connected() {
            log::error!(
                "failed to reconnect after {max_attempts} attempts; staying down until connect() is called"
            );
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
