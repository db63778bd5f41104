//! Infrastructure layer: adapters to the outside world.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`, and
//! `pose_stream_core`, but MUST NOT be imported by the `application` or
//! domain layers (tests excepted).
//!
//! # Sub-modules
//!
//! - **`transport`** – WebSocket [`Connector`](crate::application::connection_manager::Connector)
//!   built on `tokio-tungstenite`, plus a `MockConnector` for tests.
//! - **`capture`** – Frame sources: an `ffmpeg` child process and a synthetic
//!   test pattern.
//! - **`encoding`** – JPEG data-URL frame encoder.
//! - **`http_api`** – `start_session` and `exercises` requests to the backend.
//! - **`storage`** – The optional TOML configuration file.

pub mod capture;
pub mod encoding;
pub mod http_api;
pub mod storage;
pub mod transport;
