//! Per-frame lock / follow / abandon decisions for a single face target.
//!
//! The tracker is pure: no I/O, no clock of its own. Callers pass the
//! current detections and the current time; at most one [`EffectEvent`]
//! comes back per call.

use std::time::{Duration, Instant};

use crate::detection::domain::detection::Detection;
use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::effect_event::EffectEvent;
use crate::tracking::domain::mode::Mode;
use crate::tracking::domain::tracker_config::TrackerConfig;

/// Result of trying to find the locked target among this frame's detections.
#[derive(Clone, Copy, Debug, PartialEq)]
enum TrackOutcome {
    /// Matched; the target now sits at this box (detector coordinates).
    Found(BoundingBox),
    /// Missed, but fewer than `max_drops` frames in a row.
    Inconclusive,
    /// Missed `max_drops` frames in a row; the target has been released.
    Lost,
}

/// Mutable tracking state. Owned by exactly one [`TargetTracker`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingState {
    pub mode: Mode,
    pub drop_count: u32,
    /// Last confirmed box of the locked face, in detector coordinates.
    pub target: Option<BoundingBox>,
}

pub struct TargetTracker {
    config: TrackerConfig,
    state: TrackingState,
}

impl TargetTracker {
    /// The config is assumed valid; see [`TrackerConfig::validate`].
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: TrackingState::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn target(&self) -> Option<&BoundingBox> {
        self.state.target.as_ref()
    }

    pub fn drop_count(&self) -> u32 {
        self.state.drop_count
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.state.mode.remaining(now)
    }

    /// Forgets the locked face without touching the mode.
    pub fn release_target(&mut self) {
        self.state.target = None;
        self.state.drop_count = 0;
    }

    /// Drops any lock and parks the tracker in [`Mode::Moving`] until the
    /// next ordinary [`step`](Self::step).
    pub fn hold_for_motion(&mut self) {
        if self.state.mode != Mode::Moving {
            log::debug!("camera moving, leaving {}", self.state.mode);
        }
        self.release_target();
        self.state.mode = Mode::Moving;
    }

    /// Advances the state machine by one frame.
    pub fn step(&mut self, detections: &[Detection], now: Instant) -> Option<EffectEvent> {
        match self.state.mode {
            Mode::Idle => self.acquire(detections, now),
            Mode::Moving => {
                self.enter(Mode::Idle);
                self.acquire(detections, now)
            }
            Mode::EffectStart { deadline } => {
                if now < deadline {
                    return self.follow(detections, now);
                }
                let run_deadline = now + self.config.timings.run;
                self.enter(Mode::EffectRun {
                    deadline: run_deadline,
                });
                self.run_phase(detections, now, run_deadline)
            }
            Mode::EffectRun { deadline } => self.run_phase(detections, now, deadline),
            Mode::EffectAbort { deadline } => {
                if now >= deadline {
                    self.enter(Mode::Idle);
                }
                None
            }
        }
    }

    fn run_phase(
        &mut self,
        detections: &[Detection],
        now: Instant,
        deadline: Instant,
    ) -> Option<EffectEvent> {
        if now < deadline {
            return self.follow(detections, now);
        }
        // Effect ran its full course; the downstream already knows the timings.
        self.release_target();
        self.enter(Mode::EffectAbort {
            deadline: now + self.config.timings.abort,
        });
        None
    }

    fn acquire(&mut self, detections: &[Detection], now: Instant) -> Option<EffectEvent> {
        let bbox = self.find_best_target(detections)?;
        self.state.target = Some(bbox);
        self.state.drop_count = 0;
        self.enter(Mode::EffectStart {
            deadline: now + self.config.timings.start,
        });
        Some(EffectEvent::EffectStart {
            bbox: self.config.orientation.to_upright(bbox),
            timings: self.config.timings,
        })
    }

    fn follow(&mut self, detections: &[Detection], now: Instant) -> Option<EffectEvent> {
        match self.find_locked_target(detections) {
            TrackOutcome::Found(bbox) => Some(EffectEvent::EffectRun {
                bbox: self.config.orientation.to_upright(bbox),
            }),
            // temporary loss, keep the lock
            TrackOutcome::Inconclusive => None,
            TrackOutcome::Lost => {
                let abort = self.config.timings.abort;
                self.enter(Mode::EffectAbort {
                    deadline: now + abort,
                });
                Some(EffectEvent::EffectAbort { abort })
            }
        }
    }

    /// Largest qualifying face; ties keep the first one seen.
    fn find_best_target(&self, detections: &[Detection]) -> Option<BoundingBox> {
        let mut best: Option<(BoundingBox, f64)> = None;
        for det in detections {
            if !qualifies(det.score, self.config.detection_threshold) {
                continue;
            }
            let area = det.bbox.area();
            if !area.is_finite() || area <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, best_area)| area > best_area) {
                best = Some((det.bbox, area));
            }
        }
        best.map(|(bbox, _)| bbox)
    }

    /// Nearest qualifying face within the distance gate of the current target.
    fn find_locked_target(&mut self, detections: &[Detection]) -> TrackOutcome {
        let Some(target) = self.state.target else {
            return TrackOutcome::Lost;
        };
        let max_distance = self.config.distance_gate.max_distance(&target);

        let mut closest: Option<(BoundingBox, f64)> = None;
        for det in detections {
            if !qualifies(det.score, self.config.tracking_threshold) {
                continue;
            }
            let distance = target.center_distance(&det.bbox);
            if distance.is_nan() || distance > max_distance {
                continue;
            }
            if closest.map_or(true, |(_, best)| distance < best) {
                closest = Some((det.bbox, distance));
            }
        }

        if let Some((bbox, _)) = closest {
            self.state.target = Some(bbox);
            self.state.drop_count = 0;
            return TrackOutcome::Found(bbox);
        }

        self.state.drop_count += 1;
        if self.state.drop_count < self.config.max_drops {
            TrackOutcome::Inconclusive
        } else {
            log::debug!("target lost after {} dropped frames", self.state.drop_count);
            self.release_target();
            TrackOutcome::Lost
        }
    }

    fn enter(&mut self, mode: Mode) {
        log::debug!("tracker {} -> {}", self.state.mode, mode);
        self.state.mode = mode;
    }
}

/// NaN scores never qualify.
fn qualifies(score: f64, threshold: f64) -> bool {
    score >= threshold
}
