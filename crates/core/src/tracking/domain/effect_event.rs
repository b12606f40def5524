use std::time::Duration;

use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::tracker_config::EffectTimings;

/// What the tracker decided this frame. Boxes are always in the upright
/// frame, whatever orientation the detector worked in.
///
/// Each event is delivered at most once and then dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectEvent {
    /// A new face was locked; the effect starts with the given phase timings.
    EffectStart {
        bbox: BoundingBox,
        timings: EffectTimings,
    },
    /// The locked face was found again at `bbox`.
    EffectRun { bbox: BoundingBox },
    /// The locked face was lost; the effect winds down over `abort`.
    EffectAbort { abort: Duration },
    /// The camera is moving, nothing is tracked.
    CameraMoving,
}

impl EffectEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EffectEvent::EffectStart { .. } => "effect_start",
            EffectEvent::EffectRun { .. } => "effect_run",
            EffectEvent::EffectAbort { .. } => "effect_abort",
            EffectEvent::CameraMoving => "camera_moving",
        }
    }

    pub fn bbox(&self) -> Option<&BoundingBox> {
        match self {
            EffectEvent::EffectStart { bbox, .. } | EffectEvent::EffectRun { bbox } => Some(bbox),
            EffectEvent::EffectAbort { .. } | EffectEvent::CameraMoving => None,
        }
    }
}
