//! A frame source that needs no hardware.
//!
//! Produces an RGB test pattern that shifts by a few pixels every poll, so a
//! backend watching the stream sees motion.  Used by `--source synthetic` and
//! throughout the tests.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use pose_stream_core::{CaptureError, FrameDimensions, PixelFormat, VideoFrame};

use crate::application::capture_loop::FrameSource;

/// Pixels the pattern moves per frame.
const PATTERN_STEP: u32 = 4;

/// Changes the size of a [`SyntheticFrameSource`] from outside, the way a
/// real device renegotiates its resolution.
#[derive(Clone)]
pub struct ResizeHandle {
    dimensions: Arc<Mutex<FrameDimensions>>,
}

impl ResizeHandle {
    pub fn resize(&self, dimensions: FrameDimensions) {
        if let Ok(mut current) = self.dimensions.lock() {
            *current = dimensions;
        }
    }
}

pub struct SyntheticFrameSource {
    dimensions: Arc<Mutex<FrameDimensions>>,
    warmup_polls: u32,
    sequence: u64,
}

impl SyntheticFrameSource {
    pub fn new(dimensions: FrameDimensions) -> Self {
        Self {
            dimensions: Arc::new(Mutex::new(dimensions)),
            warmup_polls: 0,
            sequence: 0,
        }
    }

    /// Reports `NotReady` for the first `polls` calls, like a camera that is
    /// still starting up.
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    pub fn resize_handle(&self) -> ResizeHandle {
        ResizeHandle {
            dimensions: Arc::clone(&self.dimensions),
        }
    }

    fn render(&self, dimensions: FrameDimensions) -> Vec<u8> {
        let offset = (self.sequence as u32).wrapping_mul(PATTERN_STEP);
        let mut data = Vec::with_capacity(dimensions.buffer_len(PixelFormat::Rgb8));
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                data.push((x.wrapping_add(offset) % 256) as u8);
                data.push((y.wrapping_add(offset) % 256) as u8);
                data.push((self.sequence % 256) as u8);
            }
        }
        data
    }
}

impl FrameSource for SyntheticFrameSource {
    fn current_frame(&mut self) -> Result<Arc<VideoFrame>, CaptureError> {
        if self.warmup_polls > 0 {
            self.warmup_polls -= 1;
            return Err(CaptureError::NotReady);
        }

        let dimensions = self
            .dimensions
            .lock()
            .map(|d| *d)
            .map_err(|_| CaptureError::DeviceUnavailable("resize lock poisoned".to_string()))?;
        let data = self.render(dimensions);
        let frame = VideoFrame::new(
            data,
            dimensions,
            PixelFormat::Rgb8,
            self.sequence,
            Instant::now(),
        )
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        self.sequence += 1;
        Ok(Arc::new(frame))
    }
}
