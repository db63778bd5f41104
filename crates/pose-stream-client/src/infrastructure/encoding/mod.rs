//! JPEG data-URL encoder.
//!
//! Frames are compressed with the `image` crate's baseline JPEG encoder and
//! wrapped as `data:image/jpeg;base64,<payload>`, which is what the backend
//! expects in the `frame` field.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};
use pose_stream_core::{PixelFormat, VideoFrame};

use crate::application::capture_loop::{EncodeError, FrameEncoder};

/// Prefix of every encoded payload.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

pub struct JpegDataUrlEncoder {
    quality: u8,
}

impl JpegDataUrlEncoder {
    /// `quality` is on the 0–1 scale; it is mapped onto JPEG's 1–100.
    pub fn new(quality: f32) -> Self {
        let scaled = (quality * 100.0).round().clamp(1.0, 100.0);
        Self {
            quality: scaled as u8,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl FrameEncoder for JpegDataUrlEncoder {
    fn encode(&mut self, frame: &VideoFrame) -> Result<String, EncodeError> {
        let dims = frame.dimensions();
        let rgb: Vec<u8> = match frame.format() {
            PixelFormat::Rgb8 => frame.data().to_vec(),
            // JPEG has no alpha channel.
            PixelFormat::Rgba8 => frame
                .data()
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };
        let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(dims.width, dims.height, rgb).ok_or_else(|| {
                EncodeError::Image(format!("buffer does not match {dims}"))
            })?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&image)
            .map_err(|e| EncodeError::Image(e.to_string()))?;

        let mut payload = String::with_capacity(DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        payload.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&jpeg, &mut payload);
        Ok(payload)
    }
}
