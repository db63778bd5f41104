//! CaptureLoop: the per-tick send decision.
//!
//! On every display-refresh tick the streaming task calls [`CaptureLoop::tick`],
//! which composes the frame source, the rate limiter, the backpressure gate,
//! and the connection manager:
//!
//! ```text
//! current_frame() ──NotReady──► skip
//!       │
//!       ▼
//! RateLimiter::permitted? ──no──► skip
//!       │
//!       ▼
//! connection Open && gate open? ──no──► skip
//!       │
//!       ▼
//! close gate, record send, encode, transmit ──failure──► reopen gate
//! ```
//!
//! The loop owns all of its collaborators.  The gate is lent to the
//! connection manager as `&mut` whenever the manager needs to reopen it, so
//! there is exactly one owner and no shared cell.

use std::sync::Arc;
use std::time::Duration;

use pose_stream_core::{
    BackpressureGate, CaptureError, DimensionTracker, ExerciseId, RateLimiter, VideoFrame,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::connection_manager::{ConnectionEvent, ConnectionManager};
use crate::domain::events::{ConnectionState, SessionEvent, StreamStats};

/// A continuous video capture device.
pub trait FrameSource: Send {
    /// The most recently decoded frame.
    ///
    /// Must not block.  Returns [`CaptureError::NotReady`] until the device
    /// has produced data.
    fn current_frame(&mut self) -> Result<Arc<VideoFrame>, CaptureError>;
}

/// Errors raised while turning a frame into a transmissible payload.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image encoding failed: {0}")]
    Image(String),
}

/// Converts a frame into the payload string carried by a frame message.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &VideoFrame) -> Result<String, EncodeError>;
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The device has no frame yet.
    NotReady,
    /// Too soon after the previous send.
    RateLimited,
    /// The connection is not open.
    NotConnected,
    /// The previous frame has not been acknowledged.
    AwaitingAck,
    /// A frame was transmitted and the gate is now closed.
    Sent,
    /// Encoding or transmission failed; the gate was reopened.
    SendFailed,
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    encoder: Box<dyn FrameEncoder>,
    limiter: RateLimiter,
    gate: BackpressureGate,
    connection: ConnectionManager,
    dimensions: DimensionTracker,
    ack_timeout: Option<Duration>,
    observer: Option<mpsc::UnboundedSender<SessionEvent>>,

    frames_captured: u64,
    frames_sent: u64,
    send_failures: u64,
    ack_timeouts: u64,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        encoder: Box<dyn FrameEncoder>,
        connection: ConnectionManager,
        send_interval: Duration,
    ) -> Self {
        Self {
            source,
            encoder,
            limiter: RateLimiter::new(send_interval),
            gate: BackpressureGate::new(),
            connection,
            dimensions: DimensionTracker::new(),
            ack_timeout: None,
            observer: None,
            frames_captured: 0,
            frames_sent: 0,
            send_failures: 0,
            ack_timeouts: 0,
        }
    }

    /// Reopens the gate when a sent frame has waited longer than `timeout`
    /// for its result.  `None` (the default) waits forever.
    pub fn with_ack_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Routes session events (status, results, resizes) to `observer`.
    pub fn set_observer(&mut self, observer: mpsc::UnboundedSender<SessionEvent>) {
        self.connection.set_observer(observer.clone());
        self.observer = Some(observer);
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// Only [`CaptureError::DeviceUnavailable`] is returned; it ends the
    /// session.  `NotReady` is reported as [`TickOutcome::NotReady`].
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, CaptureError> {
        self.connection.flush_session_context();

        let frame = match self.source.current_frame() {
            Ok(frame) => frame,
            Err(CaptureError::NotReady) => return Ok(TickOutcome::NotReady),
            Err(e) => return Err(e),
        };
        self.frames_captured += 1;

        if let Some(dimensions) = self.dimensions.observe(frame.dimensions()) {
            debug!("frame size is now {dimensions}");
            self.notify(SessionEvent::FrameResized(dimensions));
        }

        self.check_ack_timeout(now);

        let std_now = now.into_std();
        if !self.limiter.permitted(std_now) {
            return Ok(TickOutcome::RateLimited);
        }
        if !self.connection.is_open() {
            return Ok(TickOutcome::NotConnected);
        }
        if !self.gate.is_open() {
            return Ok(TickOutcome::AwaitingAck);
        }

        self.gate.close();
        self.limiter.record_send(std_now);

        let payload = match self.encoder.encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("frame {} not sent: {e}", frame.sequence());
                self.gate.open();
                self.send_failures += 1;
                return Ok(TickOutcome::SendFailed);
            }
        };

        match self.connection.send(payload, &mut self.gate) {
            Ok(()) => {
                self.frames_sent += 1;
                Ok(TickOutcome::Sent)
            }
            Err(e) => {
                debug!("frame {} not sent: {e}", frame.sequence());
                self.gate.open();
                self.send_failures += 1;
                Ok(TickOutcome::SendFailed)
            }
        }
    }

    /// Applies a link event from the connection manager's channel.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent, now: Instant) {
        self.connection.handle_event(event, &mut self.gate, now);
    }

    pub fn start(&mut self) {
        self.connection.start();
    }

    pub fn stop(&mut self) {
        self.connection.stop();
    }

    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        self.connection.poll_reconnect(now)
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.connection.reconnect_deadline()
    }

    pub fn set_exercise(&mut self, exercise: ExerciseId) {
        self.connection.update_session_context(exercise);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn gate_is_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn stats(&self) -> StreamStats {
        let connection = self.connection.stats();
        StreamStats {
            frames_captured: self.frames_captured,
            frames_sent: self.frames_sent,
            results_received: connection.results_received,
            send_failures: self.send_failures,
            malformed_messages: connection.malformed_messages,
            connection_losses: connection.connection_losses,
            ack_timeouts: self.ack_timeouts,
        }
    }

    fn check_ack_timeout(&mut self, now: Instant) {
        let Some(timeout) = self.ack_timeout else {
            return;
        };
        if self.gate.is_open() || !self.connection.is_open() {
            return;
        }
        let waited = self.limiter.elapsed_since_send(now.into_std());
        if waited.is_some_and(|w| w >= timeout) {
            warn!("no result within {timeout:?}; reopening the gate");
            self.ack_timeouts += 1;
            self.gate.force_open();
        }
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            let _ = observer.send(event);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
