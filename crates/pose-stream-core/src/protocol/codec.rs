//! JSON codec for the pose-stream wire protocol.
//!
//! Every WebSocket text frame carries exactly one JSON object.  This module
//! turns typed messages into text and back, and classifies failures so the
//! connection layer can decide what to do with them:
//!
//! - An outbound message that cannot be serialized is a local bug and is
//!   reported as [`ProtocolError::Encode`].
//! - An inbound text that is not valid JSON, or is a `pose_result` with
//!   missing or mistyped fields, is [`ProtocolError::Malformed`].  Callers drop
//!   these silently; they never count as a frame acknowledgment.
//! - An inbound message with an unrecognised `"type"` is *not* an error: it
//!   decodes to [`ServerMessage::Unknown`].

use thiserror::Error;

use crate::protocol::messages::{ClientMessage, ServerMessage};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The outbound message could not be serialized.
    #[error("failed to encode {kind} message: {reason}")]
    Encode { kind: &'static str, reason: String },

    /// The inbound text is not a well-formed server message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Encodes a [`ClientMessage`] into the JSON text sent on the WebSocket.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use pose_stream_core::{encode_client_message, ClientMessage};
///
/// let text = encode_client_message(&ClientMessage::frame("data:image/jpeg;base64,AA")).unwrap();
/// assert_eq!(text, r#"{"frame":"data:image/jpeg;base64,AA"}"#);
/// ```
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode {
        kind: msg.kind(),
        reason: e.to_string(),
    })
}

/// Decodes one inbound WebSocket text frame into a [`ServerMessage`].
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if `text` is not a JSON object with a
/// `"type"` field, or if a known message type is missing required fields.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Decodes a client message.  Used by test servers and diagnostics tooling
/// that sit on the backend side of the connection.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if `text` contains neither a `frame`
/// nor an `exercise` string field.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
