//! Observable state and events emitted by a streaming session.

use std::fmt;

use pose_stream_core::{FrameDimensions, PoseResult};

/// Lifecycle of the connection to the pose backend.
///
/// ```text
///            start()              handshake ok
///  Closed ───────────► Connecting ─────────────► Open
///    ▲                   │   ▲                    │
///    │ stop()      error │   │ delay elapsed      │ error / server close
///    │                   ▼   │                    │
///    └──────────────  Reconnecting ◄──────────────┘
/// ```
///
/// `stop()` reaches `Closed` from every state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Events a streaming session reports to its observer (the UI, or the CLI's
/// log output).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection changed state.  Connection loss is only ever reported
    /// this way, never as an error.
    ConnectionStatus(ConnectionState),
    /// The backend evaluated the in-flight frame.
    PoseResult(PoseResult),
    /// The capture device produced frames of a new size.
    FrameResized(FrameDimensions),
    /// The backend confirmed the session context.
    SessionStarted { exercise: String },
    /// The backend reported a processing failure.
    ServerError { message: String },
}

/// Counters accumulated over a streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Ticks on which the frame source had a frame ready.
    pub frames_captured: u64,
    pub frames_sent: u64,
    pub results_received: u64,
    /// Encode or transmit failures that reopened the gate.
    pub send_failures: u64,
    /// Inbound texts that failed to parse.
    pub malformed_messages: u64,
    /// Transitions into `Reconnecting`.
    pub connection_losses: u64,
    /// Times the acknowledgment timeout force-opened the gate.
    pub ack_timeouts: u64,
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} captured, {} sent, {} results, {} send failures, {} malformed, {} connection losses, {} ack timeouts",
            self.frames_captured,
            self.frames_sent,
            self.results_received,
            self.send_failures,
            self.malformed_messages,
            self.connection_losses,
            self.ack_timeouts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display_is_lowercase() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }

    #[test]
    fn test_stats_default_to_zero() {
        let stats = StreamStats::default();
        assert_eq!(stats.frames_sent, 0);
        assert!(stats.to_string().starts_with("0 captured, 0 sent"));
    }
}
