use std::path::PathBuf;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{CaptureTarget, FrameSource, SourceInfo};

#[cfg(target_os = "linux")]
const CAMERA_INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const CAMERA_INPUT_FORMAT: &str = "avfoundation";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const CAMERA_INPUT_FORMAT: &str = "dshow";

/// Captures from a camera device or a video file via ffmpeg-next and
/// converts every decoded frame to RGB24.
pub struct FfmpegCapture {
    state: Option<CaptureState>,
}

struct CaptureState {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    next_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: the capture is driven from one thread at a time; the raw ffmpeg
// pointers it owns are never shared.
unsafe impl Send for FfmpegCapture {}

impl FfmpegCapture {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegCapture {
    fn open(&mut self, target: &CaptureTarget) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = match target {
            CaptureTarget::File(path) => ffmpeg_next::format::input(path)?,
            CaptureTarget::Camera(index) => open_camera(*index)?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let info = SourceInfo {
            width,
            height,
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };
        log::info!("opened {target}: {width}x{height} @ {fps:.1} fps");

        self.state = Some(CaptureState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            next_index: 0,
            flushing: false,
            done: false,
        });
        Ok(info)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.state.as_mut() {
            Some(state) => Box::new(CaptureFrames { state }),
            None => Box::new(std::iter::once(Err("FfmpegCapture: not opened".into()))),
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!("capture closed");
        }
    }
}

fn camera_device(index: u32) -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from(format!("/dev/video{index}"))
    } else if cfg!(target_os = "macos") {
        PathBuf::from(index.to_string())
    } else {
        PathBuf::from(format!("video={index}"))
    }
}

fn open_camera(index: u32) -> Result<Input, Box<dyn std::error::Error>> {
    ffmpeg_next::device::register_all();
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|name| name == CAMERA_INPUT_FORMAT))
        .ok_or_else(|| format!("camera input format {CAMERA_INPUT_FORMAT} not available"))?;

    let device = camera_device(index);
    match ffmpeg_next::format::open_with(
        &device,
        &ffmpeg_next::format::Format::Input(format),
        ffmpeg_next::Dictionary::new(),
    )? {
        ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
        ffmpeg_next::format::context::Context::Output(_) => {
            Err(format!("{} opened as an output", device.display()).into())
        }
    }
}

/// Decodes lazily, one frame per `next`.
struct CaptureFrames<'a> {
    state: &'a mut CaptureState,
}

impl CaptureFrames<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let state = &mut *self.state;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        state.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = state.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let pixels = packed_rgb(&rgb, state.width, state.height);
        let frame = Frame::new(pixels, state.width, state.height, 3, state.next_index);
        state.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for CaptureFrames<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.state.flushing {
            self.state.done = true;
            return None;
        }

        loop {
            let next_packet = self.state.ictx.packets().next();
            let Some((stream, packet)) = next_packet else {
                let _ = self.state.decoder.send_eof();
                self.state.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.state.done = true;
                return None;
            };
            if stream.index() != self.state.stream_index {
                continue;
            }
            if self.state.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Strips per-row padding so the buffer is exactly `width * height * 3`.
fn packed_rgb(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Writes a short MPEG-4 clip whose frames get brighter one by one.
    fn write_clip(path: &Path, num_frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut enc_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        enc_ctx.set_width(width);
        enc_ctx.set_height(height);
        enc_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        enc_ctx.set_time_base(ffmpeg_next::Rational(1, 25));
        enc_ctx.set_frame_rate(Some(ffmpeg_next::Rational(25, 1)));
        if global_header {
            enc_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = enc_ctx.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut to_yuv = scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb.stride(0);
            let value = (i * 40 % 256) as u8;
            let data = rgb.data_mut(0);
            for row in 0..height as usize {
                data[row * stride..row * stride + width as usize * 3].fill(value);
            }
            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            to_yuv.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            let mut packet = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(ffmpeg_next::Rational(1, 25), ost_time_base);
                packet.write_interleaved(&mut octx).unwrap();
            }
        }

        encoder.send_eof().unwrap();
        let mut packet = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(ffmpeg_next::Rational(1, 25), ost_time_base);
            packet.write_interleaved(&mut octx).unwrap();
        }
        octx.write_trailer().unwrap();
    }

    #[test]
    fn test_open_file_reports_source_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_clip(&path, 4, 160, 120);

        let mut capture = FfmpegCapture::new();
        let info = capture.open(&CaptureTarget::File(path)).unwrap();
        assert_eq!((info.width, info.height), (160, 120));
        assert!(info.fps > 0.0);
    }

    #[test]
    fn test_frames_are_sequential_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_clip(&path, 4, 160, 120);

        let mut capture = FfmpegCapture::new();
        capture.open(&CaptureTarget::File(path)).unwrap();
        let frames: Vec<Frame> = capture.frames().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let mut capture = FfmpegCapture::new();
        let target = CaptureTarget::File("/nonexistent/clip.mp4".into());
        assert!(capture.open(&target).is_err());
    }

    #[test]
    fn test_frames_before_open_is_error() {
        let mut capture = FfmpegCapture::new();
        assert!(capture.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_close_twice() {
        let mut capture = FfmpegCapture::new();
        capture.close();
        capture.close();
    }

    #[test]
    fn test_camera_device_path() {
        if cfg!(target_os = "linux") {
            assert_eq!(camera_device(2), PathBuf::from("/dev/video2"));
        }
    }
}
