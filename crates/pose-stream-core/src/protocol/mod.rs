//! Protocol module containing the wire message types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_client_message, decode_server_message, encode_client_message, ProtocolError};
pub use messages::*;
