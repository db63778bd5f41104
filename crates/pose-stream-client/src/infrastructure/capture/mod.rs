//! Frame sources.
//!
//! - **`ffmpeg`** – Reads a camera, file, or stream URI through an `ffmpeg`
//!   child process emitting raw `rgb24` frames.
//! - **`synthetic`** – A generated moving test pattern for demos and tests.
//!
//! [`open_frame_source`] picks the implementation from a [`CaptureConfig`].

pub mod ffmpeg;
pub mod synthetic;

use pose_stream_core::{CaptureError, FrameDimensions};

use crate::application::capture_loop::FrameSource;
use crate::domain::config::{CaptureConfig, CaptureSource};

/// Opens the frame source described by `config`.
///
/// Must be called from within a tokio runtime; the ffmpeg source spawns its
/// reader task immediately.
///
/// # Errors
///
/// Returns [`CaptureError::DeviceUnavailable`] if the capture process cannot
/// be started.
pub fn open_frame_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let dimensions = FrameDimensions::new(config.width, config.height);
    match &config.source {
        CaptureSource::Synthetic => Ok(Box::new(synthetic::SyntheticFrameSource::new(dimensions))),
        CaptureSource::Device(input) => Ok(Box::new(ffmpeg::FfmpegFrameSource::spawn(
            input,
            dimensions,
            config.fps,
        )?)),
    }
}
