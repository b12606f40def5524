use crate::shared::bounding_box::BoundingBox;

/// One face reported by the detector for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f64) -> Self {
        Self { bbox, score }
    }
}
