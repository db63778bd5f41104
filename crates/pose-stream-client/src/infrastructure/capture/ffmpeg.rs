//! Capture through an `ffmpeg` child process.
//!
//! ffmpeg opens the input (a V4L2 device such as `/dev/video0`, a video file,
//! or an `rtsp://` / `http://` stream), scales it to the configured size, and
//! writes raw `rgb24` frames to stdout.  A reader task cuts stdout into
//! frames and publishes each one into a `watch` slot, so
//! [`FfmpegFrameSource::current_frame`] only ever looks at the newest frame
//! and never blocks.
//!
//! If the process cannot be spawned, exits, or its output ends, the slot is
//! marked failed and the next poll returns
//! [`CaptureError::DeviceUnavailable`].

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use pose_stream_core::{CaptureError, FrameDimensions, PixelFormat, VideoFrame};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::capture_loop::FrameSource;

/// Latest state of the capture pipeline.
#[derive(Debug, Clone)]
enum FrameSlot {
    Pending,
    Ready(Arc<VideoFrame>),
    Failed(String),
}

pub struct FfmpegFrameSource {
    latest: watch::Receiver<FrameSlot>,
    reader: JoinHandle<()>,
}

impl FfmpegFrameSource {
    /// Starts ffmpeg on `input` and begins reading frames.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] if ffmpeg cannot be spawned.
    pub fn spawn(input: &str, dimensions: FrameDimensions, fps: u32) -> Result<Self, CaptureError> {
        let mut cmd = build_command(input, dimensions, fps);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            CaptureError::DeviceUnavailable(format!("failed to start ffmpeg for {input}: {e}"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::DeviceUnavailable("ffmpeg stdout was not captured".to_string())
        })?;

        info!("capturing {input} at {dimensions} via ffmpeg");

        let (tx, latest) = watch::channel(FrameSlot::Pending);
        let reader = tokio::spawn(read_frames(stdout, child, dimensions, tx));
        Ok(Self { latest, reader })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn current_frame(&mut self) -> Result<Arc<VideoFrame>, CaptureError> {
        match &*self.latest.borrow() {
            FrameSlot::Pending => Err(CaptureError::NotReady),
            FrameSlot::Ready(frame) => Ok(Arc::clone(frame)),
            FrameSlot::Failed(reason) => Err(CaptureError::DeviceUnavailable(reason.clone())),
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        // Aborting drops the Child, and kill_on_drop ends the process.
        self.reader.abort();
    }
}

fn build_command(input: &str, dimensions: FrameDimensions, fps: u32) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-hide_banner").arg("-loglevel").arg("error");

    if input.starts_with("/dev/video") {
        cmd.arg("-f")
            .arg("video4linux2")
            .arg("-framerate")
            .arg(fps.to_string());
    } else if !input.contains("://") {
        // Local files are paced at their native rate instead of as fast as
        // they decode.
        cmd.arg("-re");
    }

    cmd.arg("-i")
        .arg(input)
        .arg("-an")
        .arg("-vf")
        .arg(format!("scale={}:{}", dimensions.width, dimensions.height))
        .arg("-pix_fmt")
        .arg("rgb24")
        .arg("-f")
        .arg("rawvideo")
        .arg("-");
    cmd
}

async fn read_frames(
    stdout: impl AsyncRead + Unpin,
    mut child: Child,
    dimensions: FrameDimensions,
    tx: watch::Sender<FrameSlot>,
) {
    let reason = match pump_frames(stdout, dimensions, &tx).await {
        Ok(()) => "capture stopped".to_string(),
        Err(reason) => reason,
    };

    match child.try_wait() {
        Ok(Some(status)) => debug!("ffmpeg exited with {status}"),
        _ => {
            let _ = child.kill().await;
        }
    }

    warn!("capture ended: {reason}");
    let _ = tx.send(FrameSlot::Failed(reason));
}

/// Reads frames until stdout ends or every receiver is gone.
async fn pump_frames(
    mut stdout: impl AsyncRead + Unpin,
    dimensions: FrameDimensions,
    tx: &watch::Sender<FrameSlot>,
) -> Result<(), String> {
    let frame_len = dimensions.buffer_len(PixelFormat::Rgb8);
    let mut sequence = 0u64;

    loop {
        let mut buffer = vec![0u8; frame_len];
        if let Err(e) = stdout.read_exact(&mut buffer).await {
            return Err(format!("ffmpeg output ended: {e}"));
        }

        let frame = VideoFrame::new(buffer, dimensions, PixelFormat::Rgb8, sequence, Instant::now())
            .map_err(|e| e.to_string())?;
        sequence += 1;

        if tx.send(FrameSlot::Ready(Arc::new(frame))).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pump_publishes_whole_frames_then_fails_on_truncation() {
        // Arrange: two full 2x1 frames plus a partial third
        let dimensions = FrameDimensions::new(2, 1);
        let bytes: Vec<u8> = (0..15).collect();
        let (tx, rx) = watch::channel(FrameSlot::Pending);

        // Act
        let result = pump_frames(&bytes[..], dimensions, &tx).await;

        // Assert
        assert!(result.is_err());
        let slot = rx.borrow().clone();
        match slot {
            FrameSlot::Ready(frame) => {
                assert_eq!(frame.sequence(), 1);
                assert_eq!(frame.data(), &[6, 7, 8, 9, 10, 11]);
            }
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn test_device_input_uses_v4l2() {
        let cmd = build_command("/dev/video0", FrameDimensions::new(640, 480), 30);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.windows(2).any(|w| w == ["-f", "video4linux2"]));
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=640:480"]));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_file_input_is_paced() {
        let cmd = build_command("clip.mp4", FrameDimensions::new(320, 240), 30);
        let has_re = cmd.as_std().get_args().any(|a| a == "-re");
        assert!(has_re);
    }

    #[tokio::test]
    async fn test_failed_slot_reports_device_unavailable() {
        let (tx, latest) = watch::channel(FrameSlot::Pending);
        let mut source = FfmpegFrameSource {
            latest,
            reader: tokio::spawn(async {}),
        };
        assert_eq!(source.current_frame().unwrap_err(), CaptureError::NotReady);

        tx.send(FrameSlot::Failed("ffmpeg exited".to_string())).unwrap();

        assert_eq!(
            source.current_frame().unwrap_err(),
            CaptureError::DeviceUnavailable("ffmpeg exited".to_string())
        );
    }
}
