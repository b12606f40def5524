use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameEncodeError {
    #[error("cannot encode a frame with {0} channels")]
    UnsupportedChannels(u8),
    #[error("image encoding failed: {0}")]
    Image(String),
}

/// Turns frames into the text blobs embedded in upstream records.
pub trait FrameEncoder: Send {
    /// Encodes a full video frame for the `frame` key.
    fn encode_frame(&self, frame: &Frame) -> Result<String, FrameEncodeError>;

    /// Encodes an extracted face for the `face` record. Alpha is preserved.
    fn encode_face(&self, face: &Frame) -> Result<String, FrameEncodeError>;
}
