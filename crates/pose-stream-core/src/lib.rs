//! # pose-stream-core
//!
//! Shared foundation for the pose-stream frame client: the JSON wire protocol
//! spoken with the pose-analysis backend and the flow-control primitives that
//! decide when a captured frame may be transmitted.
//!
//! This crate has no dependencies on sockets, async runtimes, or capture
//! devices.  Everything in it is driven by explicit inputs (a message string,
//! an [`std::time::Instant`]) so it can be tested without any external setup.
//!
//! # Modules
//!
//! - **`protocol`** – The messages exchanged over the WebSocket
//!   (`{"frame": ...}`, `{"exercise": ...}`, `{"type": "pose_result", ...}`)
//!   and the codec that converts them to and from JSON text.
//!
//! - **`domain`** – Frames and their dimensions, the single-slot
//!   [`BackpressureGate`], the minimum-interval [`RateLimiter`], and the
//!   [`ExerciseId`] session context.
//!
//! # Flow control in one picture
//!
//! ```text
//!  capture tick ──► RateLimiter::permitted(now)? ──► BackpressureGate::is_open()? ──► send
//!                                                          ▲                           │
//!                                                          └──── pose_result ◄─────────┘
//! ```
//!
//! At most one frame is ever in flight: the gate closes the moment a frame is
//! sent and only a valid `pose_result` (or a failed send) reopens it.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pose_stream_core::BackpressureGate` instead of the full module path.
pub use domain::frame::{
    CaptureError, DimensionTracker, FrameDimensions, FrameError, PixelFormat, VideoFrame,
};
pub use domain::gate::BackpressureGate;
pub use domain::rate_limit::{RateLimiter, DEFAULT_SEND_INTERVAL};
pub use domain::session::{ExerciseId, SessionError};
pub use protocol::codec::{decode_server_message, encode_client_message, ProtocolError};
pub use protocol::messages::{ClientMessage, Keypoint, PoseResult, ServerMessage, SkeletonColor};
