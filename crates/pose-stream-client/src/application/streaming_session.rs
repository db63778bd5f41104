//! StreamingSession: the single task that drives a streaming session.
//!
//! One tokio task selects over every source of work, so the capture loop, the
//! gate, and the connection manager are only ever touched from one place:
//!
//! ```text
//!            ┌──────────── cancellation token ─────────────┐
//!            │                                              ▼
//!  tick interval ──► CaptureLoop::tick          stop(), return stats
//!  link events  ──► CaptureLoop::handle_connection_event
//!  reconnect deadline ──► CaptureLoop::poll_reconnect
//!  commands (SetExercise) ──► CaptureLoop::set_exercise
//!  stats interval ──► log counters
//! ```
//!
//! Ticks are rescheduled unconditionally by the interval; a tick that sends
//! nothing costs one frame-slot read.  When the token is cancelled the loop
//! exits, `stop()` tears the connection down, and no further tick, link event,
//! or reconnect timer is processed.

use std::sync::Arc;
use std::time::Duration;

use pose_stream_core::{CaptureError, ExerciseId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::capture_loop::{CaptureLoop, FrameEncoder, FrameSource};
use crate::application::connection_manager::{ConnectionEvent, ConnectionManager, Connector};
use crate::domain::config::ClientConfig;
use crate::domain::events::{SessionEvent, StreamStats};

/// Errors that end a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The frame source failed for good.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The session has already stopped.
    #[error("streaming session has stopped")]
    Stopped,

    #[error("streaming task failed: {0}")]
    Task(String),
}

/// Requests sent to a running session.
#[derive(Debug)]
pub enum SessionCommand {
    SetExercise(ExerciseId),
}

pub struct StreamingSession {
    capture: CaptureLoop,
    events: mpsc::Receiver<ConnectionEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    tick_interval: Duration,
    stats_interval: Duration,
}

impl StreamingSession {
    /// Assembles a session from its collaborators.  Nothing connects until
    /// [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn new(
        config: &ClientConfig,
        source: Box<dyn FrameSource>,
        encoder: Box<dyn FrameEncoder>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (connection, events) =
            ConnectionManager::new(connector, config.ws_url.clone(), config.reconnect_delay);
        let mut capture = CaptureLoop::new(source, encoder, connection, config.send_interval)
            .with_ack_timeout(config.ack_timeout);
        if let Some(exercise) = &config.exercise {
            capture.set_exercise(exercise.clone());
        }

        let (commands_tx, commands) = mpsc::unbounded_channel();
        Self {
            capture,
            events,
            commands,
            commands_tx,
            cancel: CancellationToken::new(),
            tick_interval: config.tick_interval,
            stats_interval: config.stats_interval,
        }
    }

    /// Routes [`SessionEvent`]s to `observer`.
    pub fn set_observer(&mut self, observer: mpsc::UnboundedSender<SessionEvent>) {
        self.capture.set_observer(observer);
    }

    /// Token that stops the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the session on a new task and returns a handle to control it.
    pub fn spawn(self) -> SessionHandle {
        let controller = SessionController {
            commands: self.commands_tx.clone(),
            cancel: self.cancel.clone(),
        };
        let task = tokio::spawn(self.run());
        SessionHandle { controller, task }
    }

    /// Streams until the cancellation token fires or the frame source fails.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Capture`] when the frame source reports
    /// `DeviceUnavailable`.  Connection problems never end the session.
    pub async fn run(mut self) -> Result<StreamStats, StreamError> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_ticker = interval_at(Instant::now() + self.stats_interval, self.stats_interval);

        info!("streaming session started");
        self.capture.start();

        let outcome = loop {
            let reconnect_at = self.capture.reconnect_deadline();

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("streaming session cancelled");
                    break Ok(());
                }

                Some(event) = self.events.recv() => {
                    self.capture.handle_connection_event(event, Instant::now());
                }

                Some(command) = self.commands.recv() => match command {
                    SessionCommand::SetExercise(exercise) => self.capture.set_exercise(exercise),
                },

                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.capture.poll_reconnect(Instant::now());
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.capture.tick(Instant::now()) {
                        error!("capture failed: {e}");
                        break Err(StreamError::Capture(e));
                    }
                }

                _ = stats_ticker.tick() => {
                    info!("streaming: {}", self.capture.stats());
                }
            }
        };

        self.capture.stop();
        let stats = self.capture.stats();
        info!("streaming session ended: {stats}");
        outcome.map(|()| stats)
    }
}

/// Cloneable control surface of a running session: switch the exercise or
/// stop streaming from any task.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionController {
    /// Switches the session context.
    ///
    /// # Errors
    ///
    /// [`StreamError::Stopped`] if the session is no longer running.
    pub fn set_exercise(&self, exercise: ExerciseId) -> Result<(), StreamError> {
        self.commands
            .send(SessionCommand::SetExercise(exercise))
            .map_err(|_| StreamError::Stopped)
    }

    /// Asks the session to stop.  Returns immediately.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Owns a session running on its own task.
pub struct SessionHandle {
    controller: SessionController,
    task: JoinHandle<Result<StreamStats, StreamError>>,
}

impl SessionHandle {
    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    /// See [`SessionController::set_exercise`].
    ///
    /// # Errors
    ///
    /// [`StreamError::Stopped`] if the session is no longer running.
    pub fn set_exercise(&self, exercise: ExerciseId) -> Result<(), StreamError> {
        self.controller.set_exercise(exercise)
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to end and returns its statistics.
    ///
    /// # Errors
    ///
    /// Whatever ended the session, or [`StreamError::Task`] if the task
    /// panicked.
    pub async fn join(self) -> Result<StreamStats, StreamError> {
        self.task
            .await
            .map_err(|e| StreamError::Task(e.to_string()))?
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
