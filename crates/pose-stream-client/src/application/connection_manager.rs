//! ConnectionManager: the connection lifecycle and the fixed-delay
//! reconnection policy.
//!
//! # State machine
//!
//! The manager is an explicit four-state machine ([`ConnectionState`]):
//!
//! | From                     | Event                        | To           |
//! |--------------------------|------------------------------|--------------|
//! | Closed / Reconnecting    | `start()`                    | Connecting   |
//! | Connecting               | handshake succeeded          | Open         |
//! | Connecting / Open        | error, refusal, server close | Reconnecting |
//! | Reconnecting             | reconnect delay elapsed      | Connecting   |
//! | any                      | `stop()`                     | Closed       |
//!
//! Entering `Open` resets the backpressure gate (a fresh connection has
//! nothing in flight and owes no late results) and transmits the current
//! session context, if any.
//!
//! # Generations
//!
//! Every connection attempt runs in its own link task and is tagged with a
//! new *generation* number.  Events carry the generation of the link that
//! produced them, and the manager ignores anything from an older generation.
//! This is what makes `stop()` final: it bumps the generation and aborts the
//! link task, so a late message or close notification from a dying
//! connection can never mutate state after teardown.
//!
//! # Non-blocking
//!
//! Nothing here awaits.  `start()` spawns the handshake, `send()` uses
//! `try_send`, and results arrive later as [`ConnectionEvent`]s that the
//! streaming task feeds back through [`ConnectionManager::handle_event`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pose_stream_core::{
    decode_server_message, encode_client_message, BackpressureGate, ClientMessage, ExerciseId,
    ProtocolError, ServerMessage,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::events::{ConnectionState, SessionEvent};

/// Capacity of the channel carrying link events to the streaming task.
const EVENT_CHANNEL_CAPACITY: usize = 128;

// ── Transport seam ────────────────────────────────────────────────────────────

/// Errors raised while establishing a transport link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
}

/// An established, message-oriented, full-duplex link to the backend.
///
/// The link implementation owns the socket.  Dropping `outbound` asks it to
/// close; the link closing for any reason ends `inbound`.
pub struct TransportLink {
    /// Outbound text frames.  A failed `try_send` is a synchronous send failure.
    pub outbound: mpsc::Sender<String>,
    /// Inbound text frames.  `None` from `recv()` means the link closed.
    pub inbound: mpsc::Receiver<String>,
}

/// Opens transport links.
///
/// The WebSocket implementation lives in `infrastructure::transport`; tests
/// use `infrastructure::transport::mock::MockConnector`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake with `url`.
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError>;
}

/// Notifications from a link task to the streaming task.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The handshake succeeded.
    Opened {
        generation: u64,
        outbound: mpsc::Sender<String>,
    },
    /// One inbound text frame.
    Message { generation: u64, text: String },
    /// The handshake failed.
    Failed { generation: u64, reason: String },
    /// The established link closed (server close or I/O error).
    Closed { generation: u64 },
}

impl ConnectionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation, .. }
            | Self::Message { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Closed { generation } => *generation,
        }
    }
}

/// Why [`ConnectionManager::send`] did not transmit.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection is not open; nothing was transmitted.
    #[error("connection is {0}, not open")]
    NotOpen(ConnectionState),

    /// The link's outbound buffer is full.
    #[error("outbound buffer full")]
    Full,

    /// The link task has gone away; its close notification will follow.
    #[error("link closed")]
    LinkClosed,

    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Counters owned by the connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub results_received: u64,
    pub malformed_messages: u64,
    pub connection_losses: u64,
}

// ── ConnectionManager ─────────────────────────────────────────────────────────

/// Owns the connection to the pose backend.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    url: String,
    reconnect_delay: Duration,

    state: ConnectionState,
    generation: u64,
    link_task: Option<JoinHandle<()>>,
    outbound: Option<mpsc::Sender<String>>,
    reconnect_at: Option<Instant>,

    session_context: Option<ExerciseId>,
    context_pending: bool,

    events_tx: mpsc::Sender<ConnectionEvent>,
    observer: Option<mpsc::UnboundedSender<SessionEvent>>,
    stats: ConnectionStats,
}

impl ConnectionManager {
    /// Creates a closed manager.
    ///
    /// Returns the manager and the receiver on which link events arrive.  The
    /// owner must pass every received event back to [`handle_event`].
    ///
    /// [`handle_event`]: ConnectionManager::handle_event
    pub fn new(
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let manager = Self {
            connector,
            url: url.into(),
            reconnect_delay,
            state: ConnectionState::Closed,
            generation: 0,
            link_task: None,
            outbound: None,
            reconnect_at: None,
            session_context: None,
            context_pending: false,
            events_tx,
            observer: None,
            stats: ConnectionStats::default(),
        };
        (manager, events_rx)
    }

    /// Routes status changes and decoded results to `observer`.
    pub fn set_observer(&mut self, observer: mpsc::UnboundedSender<SessionEvent>) {
        self.observer = Some(observer);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Generation of the current (or most recent) link.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the pending reconnection attempt is due, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn session_context(&self) -> Option<&ExerciseId> {
        self.session_context.as_ref()
    }

    /// `true` while a context update is waiting to be retransmitted.
    pub fn session_context_pending(&self) -> bool {
        self.context_pending
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Begins a connection attempt.
    ///
    /// No-op while `Connecting` or `Open`.  From `Reconnecting` the pending
    /// delay is skipped and a handshake starts immediately.
    pub fn start(&mut self) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                debug!("start ignored: connection already {}", self.state);
            }
            ConnectionState::Closed | ConnectionState::Reconnecting => self.begin_connect(),
        }
    }

    /// Tears the connection down for good.
    ///
    /// Cancels any pending reconnection, aborts the link task, and detaches
    /// result handling: events from the old link are ignored from now on.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.reconnect_at = None;
        self.outbound = None;
        if let Some(task) = self.link_task.take() {
            task.abort();
        }
        if self.state != ConnectionState::Closed {
            info!("connection to {} closed", self.url);
            self.transition(ConnectionState::Closed);
        }
    }

    /// Transmits one encoded frame.
    ///
    /// Does nothing and returns [`SendError::NotOpen`] unless the connection
    /// is open.  If the link rejects the message the gate is reopened here;
    /// the connection state is left for the link's close notification to
    /// correct.
    ///
    /// # Errors
    ///
    /// See [`SendError`].
    pub fn send(&mut self, payload: String, gate: &mut BackpressureGate) -> Result<(), SendError> {
        self.flush_session_context();
        let result = self.transmit(&ClientMessage::frame(payload));
        if matches!(result, Err(SendError::Full | SendError::LinkClosed | SendError::Encode(_))) {
            gate.open();
        }
        result
    }

    /// Stores the session context and sends it now if the connection is
    /// open; otherwise it goes out on the next `Open` transition.
    pub fn update_session_context(&mut self, exercise: ExerciseId) {
        info!("session context set to '{exercise}'");
        self.session_context = Some(exercise);
        if self.is_open() {
            self.transmit_session_context();
        }
    }

    /// Retransmits a context update that could not be sent earlier.  The
    /// backend keeps scoring against the old exercise until it arrives.
    pub fn flush_session_context(&mut self) {
        if self.context_pending && self.is_open() {
            self.transmit_session_context();
        }
    }

    /// Starts the pending reconnection attempt if its delay has elapsed.
    ///
    /// Returns `true` if a new attempt began.
    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        match (self.state, self.reconnect_at) {
            (ConnectionState::Reconnecting, Some(due)) if now >= due => {
                info!("reconnecting to {}", self.url);
                self.begin_connect();
                true
            }
            _ => false,
        }
    }

    /// Applies one link event.
    ///
    /// `now` is used to schedule the reconnection deadline when a link fails.
    pub fn handle_event(&mut self, event: ConnectionEvent, gate: &mut BackpressureGate, now: Instant) {
        if event.generation() != self.generation {
            debug!(
                "dropping event from stale link generation {} (current {})",
                event.generation(),
                self.generation
            );
            return;
        }

        match event {
            ConnectionEvent::Opened { outbound, .. } => {
                if self.state != ConnectionState::Connecting {
                    return;
                }
                info!("connected to {}", self.url);
                self.outbound = Some(outbound);
                gate.reset();
                self.transition(ConnectionState::Open);
                self.transmit_session_context();
            }
            ConnectionEvent::Message { text, .. } => {
                if self.state == ConnectionState::Open {
                    self.handle_message(&text, gate);
                }
            }
            ConnectionEvent::Failed { reason, .. } => {
                warn!("connection attempt failed: {reason}");
                self.schedule_reconnect(now);
            }
            ConnectionEvent::Closed { .. } => {
                warn!("connection to {} lost", self.url);
                self.schedule_reconnect(now);
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn begin_connect(&mut self) {
        self.generation += 1;
        self.reconnect_at = None;
        self.outbound = None;
        if let Some(task) = self.link_task.take() {
            task.abort();
        }
        self.transition(ConnectionState::Connecting);

        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let events = self.events_tx.clone();

        self.link_task = Some(tokio::spawn(async move {
            run_link(connector, url, generation, events).await;
        }));
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if !matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            return;
        }
        self.outbound = None;
        self.link_task = None;
        self.stats.connection_losses += 1;
        self.reconnect_at = Some(now + self.reconnect_delay);
        info!("next connection attempt in {:?}", self.reconnect_delay);
        self.transition(ConnectionState::Reconnecting);
    }

    fn handle_message(&mut self, text: &str, gate: &mut BackpressureGate) {
        match decode_server_message(text) {
            Ok(ServerMessage::PoseResult(result)) => {
                self.stats.results_received += 1;
                if !gate.acknowledge() {
                    debug!("late result for an abandoned frame; gate stays closed");
                }
                self.notify(SessionEvent::PoseResult(result));
            }
            Ok(ServerMessage::SessionStarted { exercise }) => {
                info!("backend started session for '{exercise}'");
                self.notify(SessionEvent::SessionStarted { exercise });
            }
            Ok(ServerMessage::Error { message }) => {
                warn!("backend reported an error: {message}");
                self.notify(SessionEvent::ServerError { message });
            }
            Ok(ServerMessage::Unknown) => {
                debug!("ignoring message of unhandled type");
            }
            Err(e) => {
                // A corrupt result is never treated as an acknowledgment.
                self.stats.malformed_messages += 1;
                debug!("dropping inbound message: {e}");
            }
        }
    }

    fn transmit(&mut self, msg: &ClientMessage) -> Result<(), SendError> {
        if self.state != ConnectionState::Open {
            return Err(SendError::NotOpen(self.state));
        }
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(SendError::LinkClosed);
        };
        let text = encode_client_message(msg)?;
        outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::LinkClosed,
        })
    }

    fn transmit_session_context(&mut self) {
        let Some(exercise) = self.session_context.clone() else {
            return;
        };
        match self.transmit(&ClientMessage::exercise(&exercise)) {
            Ok(()) => {
                self.context_pending = false;
                debug!("sent session context '{exercise}'");
            }
            Err(e) => {
                // Retried on the next tick, or on the next Open.
                self.context_pending = true;
                warn!("failed to send session context '{exercise}': {e}");
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug!("connection state {} -> {}", self.state, next);
        self.state = next;
        self.notify(SessionEvent::ConnectionStatus(next));
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            // The observer going away must not affect streaming.
            let _ = observer.send(event);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.link_task.take() {
            task.abort();
        }
    }
}

/// Body of a link task: handshake, then forward inbound frames until the
/// link closes.  Every event is tagged with `generation`.
async fn run_link(
    connector: Arc<dyn Connector>,
    url: String,
    generation: u64,
    events: mpsc::Sender<ConnectionEvent>,
) {
    let link = match connector.connect(&url).await {
        Ok(link) => link,
        Err(e) => {
            let _ = events
                .send(ConnectionEvent::Failed {
                    generation,
                    reason: e.to_string(),
                })
                .await;
            return;
        }
    };

    let TransportLink {
        outbound,
        mut inbound,
    } = link;

    if events
        .send(ConnectionEvent::Opened {
            generation,
            outbound,
        })
        .await
        .is_err()
    {
        return;
    }

    while let Some(text) = inbound.recv().await {
        if events
            .send(ConnectionEvent::Message { generation, text })
            .await
            .is_err()
        {
            return;
        }
    }

    let _ = events.send(ConnectionEvent::Closed { generation }).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
