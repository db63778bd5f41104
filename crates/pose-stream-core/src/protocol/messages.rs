//! JSON message types exchanged with the pose-analysis backend.
//!
//! The backend exposes a single WebSocket endpoint.  Both directions carry
//! one JSON object per text frame.
//!
//! # Message flow
//!
//! ```text
//! Client → Server:  {"frame": "data:image/jpeg;base64,..."}   streamed frame
//!                   {"exercise": "plank"}                      session context
//! Server → Client:  {"type": "pose_result", ...}               frame acknowledgment
//!                   {"type": "session_started", ...}           exercise accepted
//!                   {"type": "error", "message": ...}          engine failure
//! ```
//!
//! Outbound messages carry no discriminant field: the server tells them apart
//! by which key is present, so [`ClientMessage`] uses `#[serde(untagged)]`.
//! Inbound messages carry a `"type"` field, so [`ServerMessage`] is internally
//! tagged.  Any inbound `"type"` the client does not understand deserializes
//! to [`ServerMessage::Unknown`] rather than failing.

use serde::{Deserialize, Serialize};

use crate::domain::session::ExerciseId;

// ── Client → Server messages ──────────────────────────────────────────────────

/// All messages the client sends to the backend.
///
/// # Serde representation
///
/// ```json
/// {"frame":"data:image/jpeg;base64,/9j/4AAQ..."}
/// {"exercise":"plank"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// One encoded camera frame awaiting pose evaluation.
    Frame {
        /// Encoded image as a base64 data URL.
        frame: String,
    },

    /// Selects the reference exercise incoming frames are scored against.
    Exercise {
        /// Lowercase exercise identifier, e.g. `"plank"`.
        exercise: String,
    },
}

impl ClientMessage {
    /// Wraps an encoded frame payload.
    pub fn frame(payload: impl Into<String>) -> Self {
        Self::Frame {
            frame: payload.into(),
        }
    }

    /// Builds a session-context update for `exercise`.
    pub fn exercise(exercise: &ExerciseId) -> Self {
        Self::Exercise {
            exercise: exercise.as_str().to_string(),
        }
    }

    /// Returns a short name for logging that never includes the frame payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame { .. } => "frame",
            Self::Exercise { .. } => "exercise",
        }
    }
}

// ── Server → Client messages ──────────────────────────────────────────────────

/// All messages the backend can send to the client.
///
/// Only [`ServerMessage::PoseResult`] acknowledges a frame.  The other
/// variants are informational and never touch flow control.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Evaluation of the most recently sent frame.
    PoseResult(PoseResult),

    /// The backend accepted a session-context update.
    SessionStarted {
        /// The exercise the backend will now score against.
        exercise: String,
    },

    /// The backend could not process the stream (for example, the pose
    /// engine failed to initialise).  The server usually closes right after.
    Error {
        /// Human-readable description.
        message: String,
    },

    /// A well-formed message with a `"type"` this client does not handle.
    #[serde(other)]
    Unknown,
}

/// Pose evaluation for one frame.
///
/// Field names match the backend's JSON exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseResult {
    /// Similarity to the reference pose, 0–100.
    pub similarity: f64,
    /// Mean keypoint confidence, 0–1.
    pub confidence: f64,
    /// Corrections the user should make.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Joints that already match the reference.
    #[serde(default)]
    pub good: Vec<String>,
    /// `false` when no body was found in the frame.
    pub detected: bool,
    /// Colour the overlay should draw the skeleton in.
    pub skeleton_color: SkeletonColor,
    /// Detected keypoints in frame-relative coordinates.
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

/// Overlay colour hint sent with every pose result.
///
/// The backend sends `"green"` once similarity passes its threshold and
/// `"red"` otherwise.  Unrecognised values are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SkeletonColor {
    Green,
    Red,
    Other(String),
}

impl From<String> for SkeletonColor {
    fn from(value: String) -> Self {
        match value.as_str() {
            "green" => Self::Green,
            "red" => Self::Red,
            _ => Self::Other(value),
        }
    }
}

impl From<SkeletonColor> for String {
    fn from(value: SkeletonColor) -> Self {
        match value {
            SkeletonColor::Green => "green".to_string(),
            SkeletonColor::Red => "red".to_string(),
            SkeletonColor::Other(s) => s,
        }
    }
}

/// One body keypoint.
///
/// On the wire a keypoint is a three-element array `[x, y, confidence]`
/// where `x` and `y` are relative to the frame size (0–1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl From<[f64; 3]> for Keypoint {
    fn from([x, y, confidence]: [f64; 3]) -> Self {
        Self { x, y, confidence }
    }
}

impl From<Keypoint> for [f64; 3] {
    fn from(kp: Keypoint) -> Self {
        [kp.x, kp.y, kp.confidence]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
