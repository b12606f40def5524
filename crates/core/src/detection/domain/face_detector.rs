use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Returns every face found in the frame as a normalized box plus score,
/// in no particular order. Implementations may keep session state, hence
/// `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
