use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::shared::frame::Frame;
use crate::upstream::domain::frame_encoder::{FrameEncodeError, FrameEncoder};

/// Frames go out as resized base64 JPEG, faces as base64 PNG so the
/// cutout's alpha survives.
pub struct JpegFrameEncoder {
    size: (u32, u32),
    quality: u8,
}

impl JpegFrameEncoder {
    pub fn new(size: (u32, u32), quality: u8) -> Self {
        Self { size, quality }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode_frame(&self, frame: &Frame) -> Result<String, FrameEncodeError> {
        let rgb = to_rgb_image(frame)?;
        let (w, h) = self.size;
        let resized = if rgb.dimensions() == (w, h) {
            rgb
        } else {
            image::imageops::resize(&rgb, w, h, FilterType::Triangle)
        };

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&resized)
            .map_err(|e| FrameEncodeError::Image(e.to_string()))?;
        Ok(STANDARD.encode(buf))
    }

    fn encode_face(&self, face: &Frame) -> Result<String, FrameEncodeError> {
        let rgba = match face.channels() {
            4 => face.clone(),
            3 => face.with_opaque_alpha(),
            n => return Err(FrameEncodeError::UnsupportedChannels(n)),
        };

        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(
                rgba.data(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| FrameEncodeError::Image(e.to_string()))?;
        Ok(STANDARD.encode(buf))
    }
}

fn to_rgb_image(frame: &Frame) -> Result<RgbImage, FrameEncodeError> {
    let data = frame.data().to_vec();
    let (w, h) = (frame.width(), frame.height());
    let invalid = || FrameEncodeError::Image("frame buffer does not match its dimensions".into());
    match frame.channels() {
        3 => RgbImage::from_raw(w, h, data).ok_or_else(invalid),
        4 => RgbaImage::from_raw(w, h, data)
            .map(|img| DynamicImage::ImageRgba8(img).to_rgb8())
            .ok_or_else(invalid),
        n => Err(FrameEncodeError::UnsupportedChannels(n)),
    }
}
