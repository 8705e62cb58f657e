//! Aspect-preserving letterbox transform.
//!
//! Frames are scaled to fit the detector's native input, padded with
//! neutral gray, and the transform is recorded so output coordinates can
//! be mapped back to source-image pixels.

use vigil_models::{Frame, PixelLayout};

/// A recorded letterbox transform from source image to detector input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Source dimensions.
    pub src_w: u32,
    pub src_h: u32,
    /// Detector input dimensions.
    pub dst_w: u32,
    pub dst_h: u32,
    /// Uniform scale applied to the source.
    pub scale: f32,
    /// Padding added on the left and top of the scaled image.
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Compute the transform for a source/destination pair.
    pub fn compute(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
        let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
        let scaled_w = src_w as f32 * scale;
        let scaled_h = src_h as f32 * scale;
        Self {
            src_w,
            src_h,
            dst_w,
            dst_h,
            scale,
            pad_x: (dst_w as f32 - scaled_w) / 2.0,
            pad_y: (dst_h as f32 - scaled_h) / 2.0,
        }
    }

    /// True when no resampling is needed at all.
    pub fn is_identity(&self) -> bool {
        self.src_w == self.dst_w && self.src_h == self.dst_h
    }

    /// Map a point in detector-input pixels back to source-image pixels.
    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x) / self.scale,
            (y - self.pad_y) / self.scale,
        )
    }

    /// Map a normalized [0,1] detector-output point to source pixels.
    ///
    /// Normalized coordinates are interpreted over the detector input
    /// (including padding), matching how the backends report them.
    pub fn normalized_to_image(&self, nx: f32, ny: f32) -> (f32, f32) {
        self.to_image(nx * (self.dst_w as f32 - 1.0), ny * (self.dst_h as f32 - 1.0))
    }

    /// Resample a frame into a letterboxed RGB buffer of the destination
    /// size. Nearest-neighbor; padding is neutral gray.
    pub fn apply(&self, frame: &Frame) -> Vec<u8> {
        let mut out = vec![128u8; self.dst_w as usize * self.dst_h as usize * 3];
        if frame.width != self.src_w || frame.height != self.src_h {
            return out;
        }
        let (r_off, b_off) = match frame.layout {
            PixelLayout::Rgb8 => (0usize, 2usize),
            PixelLayout::Bgr8 => (2usize, 0usize),
        };
        let scaled_w = (self.src_w as f32 * self.scale).round() as u32;
        let scaled_h = (self.src_h as f32 * self.scale).round() as u32;
        let x0 = self.pad_x.round() as u32;
        let y0 = self.pad_y.round() as u32;

        for dy in 0..scaled_h.min(self.dst_h) {
            let sy = ((dy as f32 / self.scale) as u32).min(self.src_h - 1);
            for dx in 0..scaled_w.min(self.dst_w) {
                let sx = ((dx as f32 / self.scale) as u32).min(self.src_w - 1);
                let src_idx = (sy as usize * self.src_w as usize + sx as usize) * 3;
                let dst_idx =
                    ((y0 + dy) as usize * self.dst_w as usize + (x0 + dx) as usize) * 3;
                out[dst_idx] = frame.data[src_idx + r_off];
                out[dst_idx + 1] = frame.data[src_idx + 1];
                out[dst_idx + 2] = frame.data[src_idx + b_off];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_source_pads_vertically() {
        let lb = Letterbox::compute(1280, 720, 256, 256);
        assert_eq!(lb.pad_x, 0.0);
        assert!(lb.pad_y > 0.0);
        assert!((lb.scale - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_point_round_trip() {
        let lb = Letterbox::compute(640, 480, 256, 256);
        // Forward-map a source point, then invert.
        let (sx, sy) = (321.0f32, 99.0f32);
        let ix = sx * lb.scale + lb.pad_x;
        let iy = sy * lb.scale + lb.pad_y;
        let (bx, by) = lb.to_image(ix, iy);
        assert!((bx - sx).abs() < 0.5);
        assert!((by - sy).abs() < 0.5);
    }

    #[test]
    fn test_identity() {
        assert!(Letterbox::compute(256, 256, 256, 256).is_identity());
        assert!(!Letterbox::compute(640, 480, 256, 256).is_identity());
    }
}
