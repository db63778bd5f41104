//! Application layer: the streaming use case.
//!
//! - **`connection_manager`** – Connection lifecycle state machine with the
//!   fixed-delay reconnection policy.  Talks to the network only through the
//!   [`Connector`](connection_manager::Connector) trait.
//!
//! - **`capture_loop`** – The per-tick send decision that combines the frame
//!   source, rate limiter, backpressure gate, and connection.
//!
//! - **`streaming_session`** – The single tokio task that drives the capture
//!   loop from timers, link events, and user commands.
//!
//! Nothing here names a concrete socket, process, or codec; those are
//! injected from the infrastructure layer.

pub mod capture_loop;
pub mod connection_manager;
pub mod streaming_session;
