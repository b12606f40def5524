use crate::person::domain::person_extractor::PersonExtractor;
use crate::shared::frame::Frame;

/// Used when no segmentation model is available: the whole crop counts as
/// the person.
#[derive(Default)]
pub struct OpaqueCutoutExtractor;

impl PersonExtractor for OpaqueCutoutExtractor {
    fn extract(&mut self, crop: &Frame) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if crop.width() == 0 || crop.height() == 0 {
            return Ok(None);
        }
        Ok(Some(crop.with_opaque_alpha()))
    }
}
