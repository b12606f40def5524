use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use planb_core::detection::infrastructure::onnx_face_detector::DEFAULT_SCORE_FLOOR;
use planb_core::shared::constants::{
    DETECTION_THRESHOLD, EFFECT_ABORT_DURATION, EFFECT_RUN_DURATION, EFFECT_START_DURATION,
    MAX_DISTANCE_RATIO, MAX_DROPS, TRACKING_THRESHOLD, UPSTREAM_RETRY_PERIOD,
};
use planb_core::tracking::domain::tracker_config::{
    ConfigError, DistanceGate, EffectTimings, Orientation, TrackerConfig,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidDuration { name: &'static str, value: f64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSetting {
    /// Multiples of the target's width.
    Relative(f64),
    /// Normalized image units.
    Absolute(f64),
}

/// Tracker tunables read from the `--config` JSON file. Missing keys keep
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection_threshold: f64,
    pub tracking_threshold: f64,
    pub distance_gate: GateSetting,
    pub max_drops: u32,
    pub effect_start_secs: f64,
    pub effect_run_secs: f64,
    pub effect_abort_secs: f64,
    pub retry_period_secs: f64,
    /// Detector-side score floor, below the tracker thresholds.
    pub score_floor: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detection_threshold: DETECTION_THRESHOLD,
            tracking_threshold: TRACKING_THRESHOLD,
            distance_gate: GateSetting::Relative(MAX_DISTANCE_RATIO),
            max_drops: MAX_DROPS,
            effect_start_secs: EFFECT_START_DURATION.as_secs_f64(),
            effect_run_secs: EFFECT_RUN_DURATION.as_secs_f64(),
            effect_abort_secs: EFFECT_ABORT_DURATION.as_secs_f64(),
            retry_period_secs: UPSTREAM_RETRY_PERIOD.as_secs_f64(),
            score_floor: DEFAULT_SCORE_FLOOR,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tracker_config(&self, orientation: Orientation) -> Result<TrackerConfig, SettingsError> {
        let config = TrackerConfig {
            detection_threshold: self.detection_threshold,
            tracking_threshold: self.tracking_threshold,
            distance_gate: match self.distance_gate {
                GateSetting::Relative(ratio) => DistanceGate::RelativeToWidth(ratio),
                GateSetting::Absolute(d) => DistanceGate::Absolute(d),
            },
            max_drops: self.max_drops,
            timings: EffectTimings {
                start: seconds("effect_start_secs", self.effect_start_secs)?,
                run: seconds("effect_run_secs", self.effect_run_secs)?,
                abort: seconds("effect_abort_secs", self.effect_abort_secs)?,
            },
            orientation,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn retry_period(&self) -> Result<Duration, SettingsError> {
        seconds("retry_period_secs", self.retry_period_secs)
    }
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, SettingsError> {
    Duration::try_from_secs_f64(value).map_err(|_| SettingsError::InvalidDuration { name, value })
}
