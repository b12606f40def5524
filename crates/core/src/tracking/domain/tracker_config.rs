use std::time::Duration;

use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::{
    DETECTION_THRESHOLD, EFFECT_ABORT_DURATION, EFFECT_RUN_DURATION, EFFECT_START_DURATION,
    MAX_DISTANCE_RATIO, MAX_DROPS, TRACKING_THRESHOLD,
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("distance gate must be positive and finite, got {0}")]
    InvalidDistanceGate(f64),
    #[error("max drops must be at least 1")]
    ZeroMaxDrops,
}

/// Durations of the three timed effect phases (T1, T2, T3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectTimings {
    pub start: Duration,
    pub run: Duration,
    pub abort: Duration,
}

impl Default for EffectTimings {
    fn default() -> Self {
        Self {
            start: EFFECT_START_DURATION,
            run: EFFECT_RUN_DURATION,
            abort: EFFECT_ABORT_DURATION,
        }
    }
}

/// How far a candidate's center may be from the locked target and still
/// count as the same face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DistanceGate {
    /// Fixed limit in normalized units.
    Absolute(f64),
    /// Limit scales with the target's width, so the tolerance follows the
    /// subject's distance from the camera.
    RelativeToWidth(f64),
}

impl DistanceGate {
    pub fn max_distance(&self, target: &BoundingBox) -> f64 {
        match *self {
            DistanceGate::Absolute(d) => d,
            DistanceGate::RelativeToWidth(ratio) => ratio * target.width().abs(),
        }
    }

    fn value(&self) -> f64 {
        match *self {
            DistanceGate::Absolute(v) | DistanceGate::RelativeToWidth(v) => v,
        }
    }
}

/// Orientation of the frame handed to the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Upright,
    /// The detector saw the frame rotated 90° clockwise (portrait processing).
    RotatedClockwise,
}

impl Orientation {
    /// Maps a detector box back into the upright frame.
    pub fn to_upright(&self, bbox: BoundingBox) -> BoundingBox {
        match self {
            Orientation::Upright => bbox,
            Orientation::RotatedClockwise => bbox.unrotate(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Minimum score to lock onto a new face.
    pub detection_threshold: f64,
    /// Minimum score to keep following a locked face.
    pub tracking_threshold: f64,
    pub distance_gate: DistanceGate,
    pub max_drops: u32,
    pub timings: EffectTimings,
    pub orientation: Orientation,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_threshold: DETECTION_THRESHOLD,
            tracking_threshold: TRACKING_THRESHOLD,
            distance_gate: DistanceGate::RelativeToWidth(MAX_DISTANCE_RATIO),
            max_drops: MAX_DROPS,
            timings: EffectTimings::default(),
            orientation: Orientation::Upright,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("detection threshold", self.detection_threshold)?;
        check_threshold("tracking threshold", self.tracking_threshold)?;
        let gate = self.distance_gate.value();
        if !gate.is_finite() || gate <= 0.0 {
            return Err(ConfigError::InvalidDistanceGate(gate));
        }
        if self.max_drops == 0 {
            return Err(ConfigError::ZeroMaxDrops);
        }
        Ok(())
    }
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
