//! Client configuration types.
//!
//! [`ClientConfig`] is the single source of truth for all runtime settings.
//! It can be built from CLI arguments, from a TOML file, or from defaults.
//! Keeping it a plain struct (no global state, no environment reads) makes the
//! streaming session easy to embed in tests: construct a config with short
//! intervals and a local test server URL, and run.
//!
//! The infrastructure layer is responsible for populating the struct; see
//! `infrastructure::storage::config` for the file format and `main.rs` for
//! the CLI flags.

use std::time::Duration;

use pose_stream_core::{ExerciseId, DEFAULT_SEND_INTERVAL};
use thiserror::Error;

/// Default WebSocket endpoint of the pose backend.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws/pose";
/// Default base URL of the backend's HTTP API.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
/// Fixed delay between a connection loss and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Capture tick period, matching a 60 Hz display refresh.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);
/// Lossy encoding quality on a 0–1 scale.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.6;

/// A configuration value that cannot be used.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidConfig {
    #[error("jpeg quality must be within (0, 1], got {0}")]
    JpegQuality(f32),

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("{name} must start with {expected}, got '{value}'")]
    UrlScheme {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("capture size must be non-zero, got {width}x{height}")]
    CaptureSize { width: u32, height: u32 },
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Generated test pattern; needs no hardware.
    Synthetic,
    /// Anything `ffmpeg -i` accepts: `/dev/video0`, a file path, an RTSP URL.
    Device(String),
}

/// Capture device settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    /// Frames are scaled to this size before reaching the streaming core.
    pub width: u32,
    pub height: u32,
    /// Requested device frame rate.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSource::Synthetic,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// All runtime configuration for the streaming client.
///
/// # Example
///
/// ```rust
/// use pose_stream_client::domain::ClientConfig;
/// use std::time::Duration;
///
/// let cfg = ClientConfig::default();
/// assert_eq!(cfg.send_interval, Duration::from_millis(66));
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket endpoint frames are streamed to.
    pub ws_url: String,
    /// Base URL for the session-start side channel.
    pub api_url: String,
    /// Exercise to score against when streaming starts.
    pub exercise: Option<ExerciseId>,
    /// Minimum spacing between two frame sends.
    pub send_interval: Duration,
    /// Capture tick period.
    pub tick_interval: Duration,
    /// Fixed reconnection delay (no exponential backoff).
    pub reconnect_delay: Duration,
    /// JPEG quality, 0–1.
    pub jpeg_quality: f32,
    /// Force the gate open if a sent frame is not acknowledged within this
    /// long.  `None` waits indefinitely.
    pub ack_timeout: Option<Duration>,
    /// How often streaming statistics are logged.
    pub stats_interval: Duration,
    pub capture: CaptureConfig,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ClientConfig {
    /// | Field           | Default                         |
    /// |-----------------|---------------------------------|
    /// | ws_url          | `ws://127.0.0.1:8000/ws/pose`   |
    /// | api_url         | `http://127.0.0.1:8000`         |
    /// | send_interval   | 66 ms                           |
    /// | tick_interval   | 16 ms                           |
    /// | reconnect_delay | 2 s                             |
    /// | jpeg_quality    | 0.6                             |
    /// | ack_timeout     | none                            |
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            exercise: None,
            send_interval: DEFAULT_SEND_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            ack_timeout: None,
            stats_interval: Duration::from_secs(10),
            capture: CaptureConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Checks values that would otherwise fail deep inside the session.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(InvalidConfig::JpegQuality(self.jpeg_quality));
        }
        for (name, value) in [
            ("send_interval", self.send_interval),
            ("tick_interval", self.tick_interval),
            ("reconnect_delay", self.reconnect_delay),
            ("stats_interval", self.stats_interval),
        ] {
            if value.is_zero() {
                return Err(InvalidConfig::ZeroDuration { name });
            }
        }
        if self.ack_timeout.is_some_and(|t| t.is_zero()) {
            return Err(InvalidConfig::ZeroDuration {
                name: "ack_timeout",
            });
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(InvalidConfig::UrlScheme {
                name: "ws_url",
                expected: "ws:// or wss://",
                value: self.ws_url.clone(),
            });
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(InvalidConfig::UrlScheme {
                name: "api_url",
                expected: "http:// or https://",
                value: self.api_url.clone(),
            });
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(InvalidConfig::CaptureSize {
                width: self.capture.width,
                height: self.capture.height,
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ClientConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_reconnect_delay_is_two_seconds() {
        assert_eq!(ClientConfig::default().reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_default_jpeg_quality_is_point_six() {
        assert_eq!(ClientConfig::default().jpeg_quality, 0.6);
    }

    #[test]
    fn test_default_has_no_ack_timeout() {
        assert_eq!(ClientConfig::default().ack_timeout, None);
    }

    #[test]
    fn test_zero_quality_is_rejected() {
        // Arrange
        let cfg = ClientConfig {
            jpeg_quality: 0.0,
            ..Default::default()
        };

        // Act / Assert
        assert_eq!(cfg.validate(), Err(InvalidConfig::JpegQuality(0.0)));
    }

    #[test]
    fn test_zero_send_interval_is_rejected() {
        let cfg = ClientConfig {
            send_interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(InvalidConfig::ZeroDuration {
                name: "send_interval"
            })
        );
    }

    #[test]
    fn test_http_ws_url_is_rejected() {
        let cfg = ClientConfig {
            ws_url: "http://127.0.0.1:8000/ws/pose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(InvalidConfig::UrlScheme { name: "ws_url", .. })
        ));
    }

    #[test]
    fn test_zero_capture_size_is_rejected() {
        let mut cfg = ClientConfig::default();
        cfg.capture.height = 0;
        assert!(matches!(cfg.validate(), Err(InvalidConfig::CaptureSize { .. })));
    }
}
