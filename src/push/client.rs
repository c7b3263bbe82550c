//! WebSocket push client
//!
//! A handle + actor pair: [`PushClient`] is a cheaply cloneable handle whose
//! commands are executed by a single background task owning the socket, the
//! outgoing queue, and the subscriber registry. Connectivity is reported
//! through a `watch` channel rather than errors — transient failures never
//! escape the public methods.
//!
//! Reconnects use a fixed interval and a bounded attempt count; exhaustion
//! leaves the client disconnected until [`PushClient::connect`] is called
//! again. The reconnect interval is deliberately not exponential. The
//! attempt budget only refills once a connection has stayed open past the
//! stability window, so a server that accepts and immediately closes still
//! runs the budget down.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::{Error, Result};

use super::queue::OutgoingQueue;
use super::{Envelope, EnvelopeKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Push client configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// WebSocket endpoint URL
    pub url: String,
    /// Interval between heartbeat pings while connected
    pub heartbeat_interval: Duration,
    /// Fixed wait between automatic reconnect attempts
    pub reconnect_interval: Duration,
    /// Automatic reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Open time after which a connection counts as stable and the
    /// reconnect attempt budget refills
    pub stability_window: Duration,
    /// Outgoing queue capacity (drop-oldest overflow)
    pub queue_capacity: usize,
    /// User id stamped onto outgoing envelopes
    pub user_id: Option<String>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            stability_window: Duration::from_secs(5),
            queue_capacity: 256,
            user_id: None,
        }
    }
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket; no reconnect pending unless one was just scheduled
    Disconnected,
    /// Socket opening
    Connecting,
    /// Socket open, heartbeat running
    Connected,
    /// Open failure or unexpected close; a reconnect may be pending
    Error,
}

/// What happened to an envelope handed to [`PushClient::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the open socket
    Sent,
    /// Held in the outgoing queue for the next flush
    Queued,
}

/// Handle identifying one subscriber registration
pub type SubscriptionId = Uuid;

/// A live subscription to one envelope kind
pub struct Subscription {
    /// Handle for [`PushClient::unsubscribe`]
    pub id: SubscriptionId,
    /// Envelopes of the subscribed kind, in arrival order
    pub receiver: mpsc::UnboundedReceiver<Envelope>,
}

enum Command {
    Connect,
    Disconnect,
    Send {
        kind: EnvelopeKind,
        data: serde_json::Value,
        reply: oneshot::Sender<SendOutcome>,
    },
    Subscribe {
        kind: EnvelopeKind,
        sender: mpsc::UnboundedSender<Envelope>,
        reply: oneshot::Sender<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
}

/// Cloneable handle to the push actor
#[derive(Clone)]
pub struct PushClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl PushClient {
    /// Spawn the actor task and return a handle to it.
    #[must_use]
    pub fn spawn(config: PushConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);

        let actor = Actor {
            queue: OutgoingQueue::new(config.queue_capacity),
            subscribers: HashMap::new(),
            attempts: 0,
            config,
            status_tx,
        };
        drop(tokio::spawn(actor.run(command_rx)));

        Self { commands, status }
    }

    /// Request a connection. No-op while already connecting or connected.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the socket and suppress automatic reconnects.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send an envelope of `kind` with `data`.
    ///
    /// Delivered immediately when connected, otherwise queued for the next
    /// flush. The outcome tells the caller which of the two happened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] only if the actor task has terminated.
    pub async fn send(&self, kind: EnvelopeKind, data: serde_json::Value) -> Result<SendOutcome> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { kind, data, reply })
            .map_err(|_| Error::WebSocket("push client stopped".to_string()))?;
        response
            .await
            .map_err(|_| Error::WebSocket("push client stopped".to_string()))
    }

    /// Register a subscriber for one envelope kind.
    ///
    /// Subscribers for the same kind receive envelopes in registration
    /// order; a dropped receiver never blocks delivery to the others.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] only if the actor task has terminated.
    pub async fn subscribe(&self, kind: EnvelopeKind) -> Result<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                kind,
                sender,
                reply,
            })
            .map_err(|_| Error::WebSocket("push client stopped".to_string()))?;
        let id = response
            .await
            .map_err(|_| Error::WebSocket("push client stopped".to_string()))?;
        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber registration.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.commands.send(Command::Unsubscribe { id });
    }

    /// Current connection status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch for status changes
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

/// Why the connected loop ended
enum Closed {
    /// Deliberate `disconnect()` — no reconnect
    Manual,
    /// Server close, transport error, or send failure — reconnect eligible
    Unexpected,
    /// All handles dropped — actor exits
    Shutdown,
}

struct Actor {
    config: PushConfig,
    queue: OutgoingQueue,
    subscribers: HashMap<EnvelopeKind, Vec<(SubscriptionId, mpsc::UnboundedSender<Envelope>)>>,
    attempts: u32,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut reconnect_at: Option<Instant> = None;

        loop {
            let (command, from_timer) = if let Some(at) = reconnect_at {
                tokio::select! {
                    () = tokio::time::sleep_until(at) => {
                        reconnect_at = None;
                        (Command::Connect, true)
                    }
                    cmd = commands.recv() => match cmd {
                        Some(cmd) => (cmd, false),
                        None => return,
                    },
                }
            } else {
                match commands.recv().await {
                    Some(cmd) => (cmd, false),
                    None => return,
                }
            };

            match command {
                Command::Connect => {
                    // An explicit connect restarts the attempt budget
                    if !from_timer {
                        self.attempts = 0;
                        reconnect_at = None;
                    }
                    self.set_status(ConnectionStatus::Connecting);
                    match tokio_tungstenite::connect_async(&self.config.url).await {
                        Ok((socket, _)) => {
                            reconnect_at = None;
                            self.set_status(ConnectionStatus::Connected);
                            tracing::info!(url = %self.config.url, "push connection open");
                            let opened = Instant::now();

                            match self.run_connected(socket, &mut commands).await {
                                Closed::Manual => {
                                    reconnect_at = None;
                                    self.set_status(ConnectionStatus::Disconnected);
                                }
                                Closed::Unexpected => {
                                    // Only a connection that held past the
                                    // stability window refills the budget;
                                    // an immediate close counts against it
                                    if opened.elapsed() >= self.config.stability_window {
                                        self.attempts = 0;
                                    }
                                    reconnect_at = self.schedule_reconnect();
                                }
                                Closed::Shutdown => return,
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "push connection failed");
                            self.set_status(ConnectionStatus::Error);
                            reconnect_at = self.schedule_reconnect();
                        }
                    }
                }
                Command::Disconnect => {
                    // Nothing open; just make sure no reconnect fires later
                    self.attempts = self.config.max_reconnect_attempts;
                    reconnect_at = None;
                    self.set_status(ConnectionStatus::Disconnected);
                }
                Command::Send { kind, data, reply } => {
                    let envelope = self.make_envelope(kind, data);
                    self.enqueue(envelope);
                    let _ = reply.send(SendOutcome::Queued);
                }
                Command::Subscribe {
                    kind,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.add_subscriber(kind, sender));
                }
                Command::Unsubscribe { id } => self.remove_subscriber(id),
            }
        }
    }

    /// Drive one open socket until it closes.
    async fn run_connected(
        &mut self,
        socket: WsStream,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Closed {
        let (mut sink, mut source) = socket.split();

        if !self.flush(&mut sink).await {
            return Closed::Unexpected;
        }

        // First tick after one full interval, not immediately
        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = send_envelope(&mut sink, &Envelope::ping()).await {
                        tracing::warn!(error = %e, "heartbeat send failed");
                        self.set_status(ConnectionStatus::Error);
                        return Closed::Unexpected;
                    }
                    tracing::trace!("heartbeat sent");
                }
                message = source.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(Message::Ping(payload))) => {
                            if sink.send(Message::Pong(payload)).await.is_err() {
                                self.set_status(ConnectionStatus::Error);
                                return Closed::Unexpected;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "push connection closed by server");
                            self.set_status(ConnectionStatus::Error);
                            return Closed::Unexpected;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "push transport error");
                            self.set_status(ConnectionStatus::Error);
                            return Closed::Unexpected;
                        }
                        None => {
                            self.set_status(ConnectionStatus::Error);
                            return Closed::Unexpected;
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        None => {
                            let _ = sink.close().await;
                            return Closed::Shutdown;
                        }
                        Some(Command::Connect) => {
                            // Already connected; resolve silently
                        }
                        Some(Command::Disconnect) => {
                            self.attempts = self.config.max_reconnect_attempts;
                            let _ = sink
                                .send(Message::Close(Some(CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "client disconnect".into(),
                                })))
                                .await;
                            let _ = sink.close().await;
                            tracing::info!("push connection closed");
                            return Closed::Manual;
                        }
                        Some(Command::Send { kind, data, reply }) => {
                            let envelope = self.make_envelope(kind, data);
                            match send_envelope(&mut sink, &envelope).await {
                                Ok(()) => {
                                    let _ = reply.send(SendOutcome::Sent);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "send failed, requeueing");
                                    self.queue.requeue_front(envelope);
                                    let _ = reply.send(SendOutcome::Queued);
                                    self.set_status(ConnectionStatus::Error);
                                    return Closed::Unexpected;
                                }
                            }
                        }
                        Some(Command::Subscribe { kind, sender, reply }) => {
                            let _ = reply.send(self.add_subscriber(kind, sender));
                        }
                        Some(Command::Unsubscribe { id }) => self.remove_subscriber(id),
                    }
                }
            }
        }
    }

    /// Flush the queue in FIFO order.
    ///
    /// On a send failure the failed envelope returns to the front and the
    /// remainder stays queued; returns whether the sink is still usable.
    async fn flush(&mut self, sink: &mut WsSink) -> bool {
        let pending = self.queue.len();
        if pending > 0 {
            tracing::debug!(pending, "flushing queued envelopes");
        }

        while let Some(envelope) = self.queue.pop() {
            if let Err(e) = send_envelope(sink, &envelope).await {
                tracing::warn!(error = %e, remaining = self.queue.len() + 1, "flush interrupted");
                self.queue.requeue_front(envelope);
                self.set_status(ConnectionStatus::Error);
                return false;
            }
        }
        true
    }

    /// Route an inbound frame to subscribers of its kind.
    fn dispatch(&mut self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable push frame");
                return;
            }
        };

        if envelope.kind == EnvelopeKind::Pong {
            tracing::trace!("heartbeat pong");
            return;
        }

        if let Some(list) = self.subscribers.get_mut(&envelope.kind) {
            // A dropped receiver is pruned; the rest still get the envelope
            list.retain(|(id, sender)| {
                if sender.send(envelope.clone()).is_ok() {
                    true
                } else {
                    tracing::debug!(subscription = %id, "pruning dead subscriber");
                    false
                }
            });
        }
    }

    fn make_envelope(&self, kind: EnvelopeKind, data: serde_json::Value) -> Envelope {
        Envelope::new(kind, data, self.config.user_id.clone())
    }

    fn enqueue(&mut self, envelope: Envelope) {
        if let Some(dropped) = self.queue.push(envelope) {
            tracing::warn!(kind = ?dropped.kind, "outgoing queue full, dropped oldest");
        }
    }

    /// Schedule the next automatic reconnect, or give up.
    fn schedule_reconnect(&mut self) -> Option<Instant> {
        if self.attempts < self.config.max_reconnect_attempts {
            self.attempts += 1;
            tracing::info!(
                attempt = self.attempts,
                max = self.config.max_reconnect_attempts,
                "reconnect scheduled"
            );
            Some(Instant::now() + self.config.reconnect_interval)
        } else {
            tracing::warn!("reconnect attempts exhausted, staying disconnected");
            self.set_status(ConnectionStatus::Disconnected);
            None
        }
    }

    fn add_subscriber(
        &mut self,
        kind: EnvelopeKind,
        sender: mpsc::UnboundedSender<Envelope>,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscribers.entry(kind).or_default().push((id, sender));
        id
    }

    fn remove_subscriber(&mut self, id: SubscriptionId) {
        for list in self.subscribers.values_mut() {
            list.retain(|(sid, _)| *sid != id);
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let _ = self.status_tx.send(status);
    }
}

async fn send_envelope(sink: &mut WsSink, envelope: &Envelope) -> Result<()> {
    let text = serde_json::to_string(envelope)?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))
}
