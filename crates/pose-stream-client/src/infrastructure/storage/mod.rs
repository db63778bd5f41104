//! Storage infrastructure: the optional TOML configuration file.
//!
//! The `config` sub-module reads the file and converts it into the domain
//! [`ClientConfig`](crate::domain::ClientConfig).  Command-line flags are
//! layered on top in `main.rs`.

pub mod config;
