//! TOML configuration file for the streaming client.
//!
//! Looked up at `--config <path>` when given, otherwise at the platform
//! config directory:
//! - Linux:    `$XDG_CONFIG_HOME/pose-stream/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/PoseStream/config.toml`
//! - Windows:  `%APPDATA%\PoseStream\config.toml`
//!
//! Every field is optional; missing fields take the defaults listed in
//! [`ClientConfig`]'s `Default` impl.
//!
//! ```toml
//! [connection]
//! ws_url = "ws://127.0.0.1:8000/ws/pose"
//! api_url = "http://127.0.0.1:8000"
//! reconnect_delay_ms = 2000
//!
//! [streaming]
//! exercise = "plank"
//! send_interval_ms = 66
//! jpeg_quality = 0.6
//! ack_timeout_ms = 5000
//!
//! [capture]
//! source = "/dev/video0"
//! width = 640
//! height = 480
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pose_stream_core::{ExerciseId, SessionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    CaptureConfig, CaptureSource, ClientConfig, InvalidConfig, DEFAULT_API_URL,
    DEFAULT_JPEG_QUALITY, DEFAULT_WS_URL,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid exercise in config: {0}")]
    Exercise(#[from] SessionError),

    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

// ── Schema ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub streaming: StreamingSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: f32,
    /// Absent means wait for results indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_timeout_ms: Option<u64>,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureSection {
    /// `"synthetic"` or any ffmpeg input (device path, file, stream URL).
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    2000
}
fn default_send_interval_ms() -> u64 {
    66
}
fn default_tick_interval_ms() -> u64 {
    16
}
fn default_jpeg_quality() -> f32 {
    DEFAULT_JPEG_QUALITY
}
fn default_stats_interval_secs() -> u64 {
    10
}
fn default_source() -> String {
    "synthetic".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_fps() -> u32 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            exercise: None,
            send_interval_ms: default_send_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            jpeg_quality: default_jpeg_quality(),
            ack_timeout_ms: None,
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Maps a `source` string onto a [`CaptureSource`].
pub fn parse_capture_source(source: &str) -> CaptureSource {
    if source.eq_ignore_ascii_case("synthetic") {
        CaptureSource::Synthetic
    } else {
        CaptureSource::Device(source.to_string())
    }
}

impl FileConfig {
    /// Converts the file contents into a validated [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Exercise`] for an empty exercise name and
    /// [`ConfigError::Invalid`] when a value fails validation.
    pub fn into_client_config(self) -> Result<ClientConfig, ConfigError> {
        let cfg = self.into_client_config_unvalidated()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Converts the file contents without range checks, for callers that
    /// apply further overrides and validate the merged result themselves.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Exercise`] for an empty exercise name.
    pub fn into_client_config_unvalidated(self) -> Result<ClientConfig, ConfigError> {
        let exercise = self
            .streaming
            .exercise
            .as_deref()
            .map(ExerciseId::new)
            .transpose()?;

        let cfg = ClientConfig {
            ws_url: self.connection.ws_url,
            api_url: self.connection.api_url,
            exercise,
            send_interval: Duration::from_millis(self.streaming.send_interval_ms),
            tick_interval: Duration::from_millis(self.streaming.tick_interval_ms),
            reconnect_delay: Duration::from_millis(self.connection.reconnect_delay_ms),
            jpeg_quality: self.streaming.jpeg_quality,
            ack_timeout: self.streaming.ack_timeout_ms.map(Duration::from_millis),
            stats_interval: Duration::from_secs(self.streaming.stats_interval_secs),
            capture: CaptureConfig {
                source: parse_capture_source(&self.capture.source),
                width: self.capture.width,
                height: self.capture.height,
                fps: self.capture.fps,
            },
            log_level: self.logging.level,
        };
        Ok(cfg)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses TOML text into a [`FileConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist) and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Loads the config file from the platform config directory, returning
/// `FileConfig::default()` if there is none.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_default_config() -> Result<FileConfig, ConfigError> {
    let Some(path) = default_config_path() else {
        return Ok(FileConfig::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Full path of the platform config file, if the platform has a config
/// directory.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("config.toml"))
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PoseStream"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pose-stream"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PoseStream")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
