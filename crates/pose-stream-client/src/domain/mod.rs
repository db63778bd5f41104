//! Domain layer for pose-stream-client.
//!
//! Plain types with no I/O, no async, and no frameworks:
//!
//! - Runtime configuration ([`ClientConfig`])
//! - Connection lifecycle states and the events a session reports
//!
//! Anything that opens a socket, spawns a process, or reads a file belongs in
//! the infrastructure layer instead.

pub mod config;
pub mod events;

pub use config::{CaptureConfig, CaptureSource, ClientConfig, InvalidConfig};
pub use events::{ConnectionState, SessionEvent, StreamStats};
