use std::fmt;
use std::path::PathBuf;

use crate::shared::frame::Frame;

/// What to capture from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Live camera by device index.
    Camera(u32),
    /// Recorded video, replayed as if it were a camera.
    File(PathBuf),
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTarget::Camera(index) => write!(f, "camera {index}"),
            CaptureTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Properties of an opened source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal rate; zero when the source does not report one.
    pub fps: f64,
    pub codec: String,
}

/// Produces RGB frames one at a time.
///
/// Implementations handle device and container details while the pipeline
/// only sees [`Frame`]s.
pub trait FrameSource: Send {
    fn open(&mut self, target: &CaptureTarget) -> Result<SourceInfo, Box<dyn std::error::Error>>;

    /// Frames in capture order. Ends when the source is exhausted.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the device or file. Safe to call more than once.
    fn close(&mut self);
}
