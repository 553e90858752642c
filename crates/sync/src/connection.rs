// Push-channel connection manager: one background task per room session.
//
// Lifecycle: Idle -> Connecting -> Authenticated -> Joined. A link lost to
// the server (or a failed connect) goes Disconnected -> Reconnecting ->
// Connecting after a fixed delay, at most `max_attempts` times in a row; then
// the manager reports `TransportUnavailable` and waits for a manual
// reconnect. A client-initiated disconnect also waits for a manual reconnect.
//
// The join frame is fire-and-forget: the manager enters `Joined` as soon as
// the frame is queued. A `room-joined` frame from the server is forwarded as
// `JoinAcknowledged` but gates nothing.
//
// `ConnectionHandle::close()` retires the task synchronously; no event is
// emitted and no state is written after it returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tripline_common::protocol::push::PushMessage;
use tripline_common::types::{Comment, CommentId, RoomId};

use crate::error::TransportError;
use crate::liveness::Liveness;
use crate::transport::{DisconnectReason, LinkEvent, PushLink, PushTransport};

// ── Configuration ───────────────────────────────────────────────────

/// Connection parameters for one room.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Push endpoint (e.g. "wss://trips.example.com/ws").
    pub endpoint: String,
    pub auth_token: String,
    pub room: RoomId,
}

/// Fixed-interval, bounded reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
    /// A link that stays up this long resets the attempt counter.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: 5,
            stable_after: Duration::from_secs(10),
        }
    }
}

// ── Connection state ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticated,
    Joined,
    Disconnected,
    Reconnecting,
    Closed,
}

// ── Outgoing events ─────────────────────────────────────────────────

/// Events emitted to the session that owns the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Join frame sent; the connection is usable.
    Joined,
    /// The server confirmed the join.
    JoinAcknowledged,
    CommentAdded(Comment),
    CommentRemoved(CommentId),
    /// The server rejected a request on this connection.
    ServerError(String),
    Disconnected { reason: DisconnectReason, will_retry: bool },
    /// Reconnection gave up after `attempts` consecutive attempts.
    TransportUnavailable { attempts: u32 },
}

// ── Handle ──────────────────────────────────────────────────────────

enum Command {
    Send { message: PushMessage, reply: oneshot::Sender<Result<(), TransportError>> },
    Reconnect,
    Disconnect,
}

struct Shared {
    room: RoomId,
    state: watch::Sender<ConnectionState>,
    liveness: Liveness,
}

/// Owner side of a spawned connection. Dropping it closes the connection.
pub struct ConnectionHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_joined(&self) -> bool {
        self.state() == ConnectionState::Joined
    }

    /// Queue a frame on the current link. Fails with `NotJoined` unless the
    /// connection is joined.
    pub async fn send(&self, message: PushMessage) -> Result<(), TransportError> {
        match self.state() {
            ConnectionState::Joined => {}
            ConnectionState::Closed => return Err(TransportError::Closed),
            _ => return Err(TransportError::NotJoined),
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { message, reply })
            .map_err(|_| TransportError::Closed)?;
        response.await.map_err(|_| TransportError::Closed)?
    }

    /// Restart with a fresh attempt budget. Ignored while joined.
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Drop the link from the client side; no automatic reconnect follows.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    pub fn close(&self) {
        if self.shared.liveness.retire() {
            info!(room = %self.shared.room, "push connection closed");
        }
        self.shared.state.send_replace(ConnectionState::Closed);
        self.task.abort();
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Connection manager ──────────────────────────────────────────────

/// Background task driving one room's push connection.
pub struct ConnectionManager<T: PushTransport> {
    config: ConnectionConfig,
    policy: ReconnectPolicy,
    transport: Arc<T>,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Consecutive reconnect attempts since the last stable link.
    attempts: u32,
}

impl<T: PushTransport> ConnectionManager<T> {
    /// Start connecting in the background.
    pub fn spawn(
        config: ConnectionConfig,
        policy: ReconnectPolicy,
        transport: Arc<T>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> ConnectionHandle {
        Self::spawn_with_liveness(config, policy, transport, events, Liveness::new())
    }

    /// Like `spawn`, but the connection ends when `liveness` is retired by
    /// its owner as well as on `close()`.
    pub fn spawn_with_liveness(
        config: ConnectionConfig,
        policy: ReconnectPolicy,
        transport: Arc<T>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        liveness: Liveness,
    ) -> ConnectionHandle {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let shared = Arc::new(Shared { room: config.room.clone(), state, liveness });
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let manager = Self {
            config,
            policy,
            transport,
            shared: Arc::clone(&shared),
            events,
            commands: commands_rx,
            attempts: 0,
        };
        let task = tokio::spawn(manager.run());

        ConnectionHandle { shared, commands: commands_tx, task }
    }

    async fn run(mut self) {
        loop {
            let Some(reason) = self.connect_and_drive().await else {
                break;
            };
            if !self.recover(reason).await {
                break;
            }
        }
        self.shared.state.send_replace(ConnectionState::Closed);
    }

    /// Connect, join, and pump the link until it ends. `None` once retired.
    async fn connect_and_drive(&mut self) -> Option<DisconnectReason> {
        self.set_state(ConnectionState::Connecting);
        let connected = tokio::select! {
            result = self.transport.connect(&self.config.endpoint, &self.config.auth_token) => result,
            _ = self.shared.liveness.retired() => return None,
        };

        let link = match connected {
            Ok(link) => link,
            Err(error) => {
                warn!(room = %self.config.room, attempt = self.attempts, %error, "push connect failed");
                return Some(DisconnectReason::server(error.to_string()));
            }
        };

        self.set_state(ConnectionState::Authenticated);
        info!(room = %self.config.room, attempt = self.attempts, "push channel connected");

        let join = PushMessage::JoinDay { day_id: self.config.room.clone() };
        if link.outbound.send(join).is_err() {
            return Some(DisconnectReason::server("link closed before join"));
        }
        self.set_state(ConnectionState::Joined);
        self.emit(ConnectionEvent::Joined);

        self.drive(link).await
    }

    async fn drive(&mut self, mut link: PushLink) -> Option<DisconnectReason> {
        let stable = tokio::time::sleep(self.policy.stable_after);
        tokio::pin!(stable);
        let mut stable_reached = false;

        loop {
            tokio::select! {
                _ = self.shared.liveness.retired() => return None,
                _ = &mut stable, if !stable_reached => {
                    stable_reached = true;
                    if self.attempts > 0 {
                        debug!(room = %self.config.room, "push link stable, reconnect budget reset");
                    }
                    self.attempts = 0;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send { message, reply }) => {
                        let result = link.outbound.send(message).map_err(|_| TransportError::Closed);
                        let _ = reply.send(result);
                    }
                    Some(Command::Reconnect) => {
                        debug!(room = %self.config.room, "already joined, reconnect ignored");
                    }
                    Some(Command::Disconnect) => {
                        return Some(DisconnectReason::client("disconnect requested"));
                    }
                    None => return None,
                },
                event = link.inbound.recv() => match event {
                    Some(LinkEvent::Message(message)) => self.dispatch(message),
                    Some(LinkEvent::Closed(reason)) => return Some(reason),
                    None => return Some(DisconnectReason::server("link dropped")),
                },
            }
        }
    }

    fn dispatch(&self, message: PushMessage) {
        if let Some(room) = message.room() {
            if room != &self.config.room {
                debug!(
                    room = %self.config.room,
                    other = %room,
                    event = message.event_name(),
                    "ignoring frame for another day"
                );
                return;
            }
        }

        let event = match message {
            PushMessage::RoomJoined { .. } => {
                debug!(room = %self.config.room, "join acknowledged");
                ConnectionEvent::JoinAcknowledged
            }
            PushMessage::CommentAdded { comment, .. } => {
                ConnectionEvent::CommentAdded(comment.into_comment())
            }
            PushMessage::CommentRemoved { comment_id, .. } => {
                ConnectionEvent::CommentRemoved(comment_id)
            }
            PushMessage::Error { message } => {
                warn!(room = %self.config.room, %message, "push server reported an error");
                ConnectionEvent::ServerError(message)
            }
            PushMessage::JoinDay { .. } | PushMessage::AddComment { .. } => {
                debug!(room = %self.config.room, event = message.event_name(), "ignoring client frame");
                return;
            }
        };
        self.emit(event);
    }

    /// Decide what follows a lost link. Returns `false` once retired.
    async fn recover(&mut self, reason: DisconnectReason) -> bool {
        if !self.shared.liveness.is_live() {
            return false;
        }
        self.set_state(ConnectionState::Disconnected);

        if !reason.is_server_initiated() {
            info!(room = %self.config.room, %reason, "push channel disconnected");
            self.emit(ConnectionEvent::Disconnected { reason, will_retry: false });
            return self.await_manual_reconnect().await;
        }

        if self.attempts >= self.policy.max_attempts {
            warn!(
                room = %self.config.room,
                attempts = self.attempts,
                %reason,
                "push channel unavailable, giving up"
            );
            self.emit(ConnectionEvent::Disconnected { reason, will_retry: false });
            self.emit(ConnectionEvent::TransportUnavailable { attempts: self.attempts });
            return self.await_manual_reconnect().await;
        }

        info!(room = %self.config.room, %reason, "push channel lost");
        self.emit(ConnectionEvent::Disconnected { reason, will_retry: true });
        self.set_state(ConnectionState::Reconnecting);

        let delay = tokio::time::sleep(self.policy.delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                _ = self.shared.liveness.retired() => return false,
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => {
                        self.attempts = 0;
                        return true;
                    }
                    Some(Command::Disconnect) => {
                        let reason = DisconnectReason::client("disconnect requested");
                        info!(room = %self.config.room, %reason, "reconnect cancelled");
                        self.set_state(ConnectionState::Disconnected);
                        self.emit(ConnectionEvent::Disconnected { reason, will_retry: false });
                        return self.await_manual_reconnect().await;
                    }
                    Some(Command::Send { reply, .. }) => {
                        let _ = reply.send(Err(TransportError::NotJoined));
                    }
                    None => return false,
                },
            }
        }

        self.attempts += 1;
        info!(
            room = %self.config.room,
            attempt = self.attempts,
            max_attempts = self.policy.max_attempts,
            "reconnecting push channel"
        );
        true
    }

    async fn await_manual_reconnect(&mut self) -> bool {
        loop {
            tokio::select! {
                _ = self.shared.liveness.retired() => return false,
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => {
                        info!(room = %self.config.room, "manual reconnect");
                        self.attempts = 0;
                        return true;
                    }
                    Some(Command::Send { reply, .. }) => {
                        let _ = reply.send(Err(TransportError::NotJoined));
                    }
                    Some(Command::Disconnect) => {}
                    None => return false,
                },
            }
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed || *state == next {
                return false;
            }
            debug!(room = %self.config.room, from = ?*state, to = ?next, "connection state");
            *state = next;
            true
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.shared.liveness.is_live() {
            let _ = self.events.send(event);
        }
    }
}
