use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in absolute image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner.
    pub x: f32,
    /// Y coordinate of the top-left corner.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Check that the box has positive area and non-negative origin.
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.width > 0.0 && self.height > 0.0
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Clip the box to `[0, width-1] x [0, height-1]` image bounds.
    pub fn clipped(&self, image_width: u32, image_height: u32) -> Self {
        let max_x = (image_width.saturating_sub(1)) as f32;
        let max_y = (image_height.saturating_sub(1)) as f32;
        let x = self.x.clamp(0.0, max_x);
        let y = self.y.clamp(0.0, max_y);
        Self {
            x,
            y,
            width: self.width.min(max_x - x).max(0.0),
            height: self.height.min(max_y - y).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_to_image() {
        let b = BoundingBox::new(-10.0, 5.0, 700.0, 100.0).clipped(640, 480);
        assert_eq!(b.x, 0.0);
        assert!(b.x + b.width <= 639.0);
    }

    #[test]
    fn test_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BoundingBox::new(0.0, 0.0, 0.0, 1.0).is_valid());
    }
}
