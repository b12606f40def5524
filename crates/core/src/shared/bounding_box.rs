/// Axis-aligned face box in normalized detector coordinates.
///
/// Field order follows the detector convention `(y1, x1, y2, x2)`, each
/// value in `[0, 1]` relative to the image the detector saw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub y1: f64,
    pub x1: f64,
    pub y2: f64,
    pub x2: f64,
}

/// Pixel rectangle: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Share of the face height added above the face when cropping for the person cutout.
const CROP_GROW_TOP: f64 = 0.75;
/// Share of the face height added below the face.
const CROP_GROW_BOTTOM: f64 = 0.0;
/// Share of the face width added on each side.
const CROP_GROW_SIDES: f64 = 0.5;

impl BoundingBox {
    pub fn new(y1: f64, x1: f64, y2: f64, x2: f64) -> Self {
        Self { y1, x1, y2, x2 }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.y1, self.x1, self.y2, self.x2]
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        (self.width() * self.height()).abs()
    }

    /// Center as `(cy, cx)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.y1 + self.y2) / 2.0, (self.x1 + self.x2) / 2.0)
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ay, ax) = self.center();
        let (by, bx) = other.center();
        let dy = ay - by;
        let dx = ax - bx;
        (dx * dx + dy * dy).sqrt()
    }

    /// Maps a box from the upright frame into the frame rotated 90° clockwise.
    pub fn rotate_clockwise(&self) -> Self {
        Self::new(self.x1, 1.0 - self.y2, self.x2, 1.0 - self.y1)
    }

    /// Inverse of [`rotate_clockwise`](Self::rotate_clockwise): maps a box found
    /// in the rotated frame back into the upright frame.
    ///
    /// This is a change of coordinate frame, the pixels are not touched.
    pub fn unrotate(&self) -> Self {
        Self::new(1.0 - self.x2, self.y1, 1.0 - self.x1, self.y2)
    }

    /// Converts to pixels, clamping to the frame.
    pub fn to_pixels(&self, frame_w: u32, frame_h: u32) -> PixelRect {
        pixel_rect(self.x1, self.y1, self.x2, self.y2, frame_w, frame_h)
    }

    /// Region used to cut the person out around a face.
    ///
    /// The face box is grown by 75% of its height upward, 50% of its width
    /// on each side and not at all downward, then clamped to the frame.
    pub fn face_crop_rect(&self, frame_w: u32, frame_h: u32) -> PixelRect {
        let h = self.height();
        let w = self.width();
        pixel_rect(
            self.x1 - w * CROP_GROW_SIDES,
            self.y1 - h * CROP_GROW_TOP,
            self.x2 + w * CROP_GROW_SIDES,
            self.y2 + h * CROP_GROW_BOTTOM,
            frame_w,
            frame_h,
        )
    }
}

fn pixel_rect(x1: f64, y1: f64, x2: f64, y2: f64, frame_w: u32, frame_h: u32) -> PixelRect {
    let max_x = frame_w.saturating_sub(1) as f64;
    let max_y = frame_h.saturating_sub(1) as f64;
    let px1 = (x1 * frame_w as f64).round().clamp(0.0, max_x) as u32;
    let py1 = (y1 * frame_h as f64).round().clamp(0.0, max_y) as u32;
    let px2 = (x2 * frame_w as f64).round().clamp(0.0, max_x) as u32;
    let py2 = (y2 * frame_h as f64).round().clamp(0.0, max_y) as u32;
    PixelRect {
        x: px1,
        y: py1,
        width: px2.saturating_sub(px1),
        height: py2.saturating_sub(py1),
    }
}
