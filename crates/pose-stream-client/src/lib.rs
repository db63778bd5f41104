//! pose-stream-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the `pose-stream` binary share the same module tree.
//!
//! # What does the client do?
//!
//! It streams camera frames to a pose-analysis backend over a WebSocket and
//! reports the backend's verdict on each one:
//!
//! 1. Tells the backend which exercise to score against (`POST /start_session`
//!    and an `{"exercise": ...}` message on the socket).
//! 2. Every display tick, reads the newest camera frame.
//! 3. Sends it as a JPEG data URL, at most every 66 ms and only when the
//!    previous frame has been answered.
//! 4. Surfaces each `pose_result` (similarity, issues, keypoints) as a
//!    [`SessionEvent`](domain::SessionEvent).
//! 5. Reconnects two seconds after any connection loss, resending the
//!    exercise once the new connection opens.

/// Domain layer: configuration and session events.
pub mod domain;

/// Application layer: connection manager, capture loop, streaming session.
pub mod application;

/// Infrastructure layer: WebSocket, capture devices, encoder, HTTP, config file.
pub mod infrastructure;
