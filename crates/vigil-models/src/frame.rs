//! Captured video frames.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pixel layout of a captured frame. Always 8-bit, HWC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// Interleaved red-green-blue, 3 bytes per pixel.
    #[default]
    Rgb8,
    /// Interleaved blue-green-red, 3 bytes per pixel.
    Bgr8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        3
    }
}

/// A single captured video frame.
///
/// Frames are immutable after capture: the source owns the buffer and
/// detectors borrow it for one pipeline traversal.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic capture timestamp in nanoseconds.
    pub ts_ns: u64,
    /// Strictly increasing sequence number assigned by the source.
    pub seq: u64,
    /// Pixel layout of `data`.
    pub layout: PixelLayout,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel bytes, `height * width * 3` long.
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame, checking that the buffer matches the declared size.
    pub fn new(
        ts_ns: u64,
        seq: u64,
        layout: PixelLayout,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Option<Self> {
        let expected = width as usize * height as usize * layout.bytes_per_pixel();
        if data.len() != expected {
            return None;
        }
        Some(Self {
            ts_ns,
            seq,
            layout,
            width,
            height,
            data,
        })
    }

    /// Expected buffer length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}
