use std::time::Duration;

/// Minimum detector score for locking onto a new face.
pub const DETECTION_THRESHOLD: f64 = 0.8;
/// Minimum detector score for keeping an existing lock.
pub const TRACKING_THRESHOLD: f64 = 0.5;
/// Maximum center jump between frames, in multiples of the target's width.
pub const MAX_DISTANCE_RATIO: f64 = 1.0;
/// Consecutive missed frames before a lock is abandoned.
pub const MAX_DROPS: u32 = 3;

pub const EFFECT_START_DURATION: Duration = Duration::from_secs(3);
pub const EFFECT_RUN_DURATION: Duration = Duration::from_secs(10);
pub const EFFECT_ABORT_DURATION: Duration = Duration::from_secs(3);

/// Minimum spacing between two upstream connect attempts.
pub const UPSTREAM_RETRY_PERIOD: Duration = Duration::from_secs(3);
pub const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
pub const UPSTREAM_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
pub const UPSTREAM_DEFAULT_HOST: &str = "localhost";
pub const UPSTREAM_DEFAULT_PORT: u16 = 8089;

/// Resolution of frames embedded in upstream records.
pub const STREAM_FRAME_SIZE: (u32, u32) = (640, 480);
pub const STREAM_JPEG_QUALITY: u8 = 80;

pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
