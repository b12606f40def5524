use crate::shared::frame::Frame;

/// Cuts the person out of a face-centred crop.
///
/// Returns an RGBA frame whose alpha channel masks everything that is not
/// the person, or `None` when nobody was found in the crop. Called once per
/// newly acquired target, never per frame.
pub trait PersonExtractor: Send {
    fn extract(&mut self, crop: &Frame) -> Result<Option<Frame>, Box<dyn std::error::Error>>;
}
