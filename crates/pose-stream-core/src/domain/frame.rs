//! Decoded video frames and capture-side errors.
//!
//! A [`VideoFrame`] is the most recently decoded image from a capture device.
//! The streaming core never owns the capture buffer: a frame source hands out
//! a cheap `Arc<VideoFrame>` handle each tick, and the handle is dropped once
//! the tick has encoded (or skipped) it.
//!
//! Capture devices may renegotiate their resolution mid-stream.
//! [`DimensionTracker`] notices when the size of consecutive frames differs so
//! the change can be propagated to anything that renders on top of the video.

use std::fmt;
use std::time::Instant;

use thiserror::Error;

/// Errors a frame source reports when asked for its current frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The device has not produced a complete decoded frame yet.
    ///
    /// Transient and expected at start-up; callers retry on the next tick.
    #[error("capture device not ready")]
    NotReady,

    /// Permission was denied or the device failed.  Terminal for the session.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Errors produced when constructing a [`VideoFrame`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero, got {0}")]
    ZeroDimensions(FrameDimensions),

    #[error("buffer holds {actual} bytes but {dimensions} {format:?} needs {expected}")]
    InvalidBufferLength {
        dimensions: FrameDimensions,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R G B.
    Rgb8,
    /// 4 bytes per pixel, R G B A.
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Width and height of a frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes a buffer of this size needs in `format`.
    pub fn buffer_len(self, format: PixelFormat) -> usize {
        self.width as usize * self.height as usize * format.bytes_per_pixel()
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One decoded image plus its metadata.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    data: Vec<u8>,
    dimensions: FrameDimensions,
    format: PixelFormat,
    sequence: u64,
    captured_at: Instant,
}

impl VideoFrame {
    /// Wraps a decoded buffer after checking that its length matches the
    /// declared dimensions and pixel format.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ZeroDimensions`] for an empty image and
    /// [`FrameError::InvalidBufferLength`] for a truncated or oversized buffer.
    pub fn new(
        data: Vec<u8>,
        dimensions: FrameDimensions,
        format: PixelFormat,
        sequence: u64,
        captured_at: Instant,
    ) -> Result<Self, FrameError> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(FrameError::ZeroDimensions(dimensions));
        }
        let expected = dimensions.buffer_len(format);
        if data.len() != expected {
            return Err(FrameError::InvalidBufferLength {
                dimensions,
                format,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            dimensions,
            format,
            sequence,
            captured_at,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Monotonic counter assigned by the frame source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Detects resolution changes between consecutive frames.
#[derive(Debug, Default)]
pub struct DimensionTracker {
    last: Option<FrameDimensions>,
}

impl DimensionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `dimensions` and returns them if they differ from the previous
    /// observation.  The very first observation always counts as a change.
    pub fn observe(&mut self, dimensions: FrameDimensions) -> Option<FrameDimensions> {
        if self.last == Some(dimensions) {
            return None;
        }
        self.last = Some(dimensions);
        Some(dimensions)
    }

    /// The most recently observed dimensions.
    pub fn current(&self) -> Option<FrameDimensions> {
        self.last
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_frame_accepts_matching_buffer() {
        // Arrange
        let dims = FrameDimensions::new(4, 2);

        // Act
        let frame = VideoFrame::new(vec![0; 24], dims, PixelFormat::Rgb8, 7, Instant::now());

        // Assert
        let frame = frame.unwrap();
        assert_eq!(frame.dimensions(), dims);
        assert_eq!(frame.sequence(), 7);
    }

    #[test]
    fn test_video_frame_rejects_short_buffer() {
        let dims = FrameDimensions::new(4, 2);
        let err = VideoFrame::new(vec![0; 23], dims, PixelFormat::Rgb8, 0, Instant::now())
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidBufferLength {
                dimensions: dims,
                format: PixelFormat::Rgb8,
                expected: 24,
                actual: 23,
            }
        );
    }

    #[test]
    fn test_video_frame_rejects_zero_width() {
        let dims = FrameDimensions::new(0, 10);
        let result = VideoFrame::new(Vec::new(), dims, PixelFormat::Rgba8, 0, Instant::now());
        assert_eq!(result.unwrap_err(), FrameError::ZeroDimensions(dims));
    }

    #[test]
    fn test_rgba_buffer_len_uses_four_bytes_per_pixel() {
        assert_eq!(FrameDimensions::new(10, 10).buffer_len(PixelFormat::Rgba8), 400);
    }

    #[test]
    fn test_dimension_tracker_reports_first_and_changed_sizes_only() {
        // Arrange
        let mut tracker = DimensionTracker::new();
        let vga = FrameDimensions::new(640, 480);
        let hd = FrameDimensions::new(1280, 720);

        // Act / Assert
        assert_eq!(tracker.observe(vga), Some(vga));
        assert_eq!(tracker.observe(vga), None);
        assert_eq!(tracker.observe(hd), Some(hd));
        assert_eq!(tracker.current(), Some(hd));
    }

    #[test]
    fn test_dimensions_display() {
        assert_eq!(FrameDimensions::new(1920, 1080).to_string(), "1920x1080");
    }
}
