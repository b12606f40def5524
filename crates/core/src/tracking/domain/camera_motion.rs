use std::time::{Duration, Instant};

use crate::detection::domain::detection::Detection;
use crate::tracking::domain::effect_event::EffectEvent;
use crate::tracking::domain::target_tracker::TargetTracker;

/// Tells whether the camera is currently moving. While it is, detections
/// are meaningless because the subject slides across the frame.
pub trait CameraMotion: Send {
    fn is_moving(&mut self, now: Instant) -> bool;

    /// Restarts whatever timing the source keeps. No-op by default.
    fn reset(&mut self, _now: Instant) {}
}

/// A camera that never moves.
pub struct StillCamera;

impl CameraMotion for StillCamera {
    fn is_moving(&mut self, _now: Instant) -> bool {
        false
    }
}

/// Wraps a [`TargetTracker`] so that camera motion overrides tracking.
pub struct MotionGatedTracker {
    tracker: TargetTracker,
    motion: Box<dyn CameraMotion>,
}

impl MotionGatedTracker {
    pub fn new(tracker: TargetTracker, motion: Box<dyn CameraMotion>) -> Self {
        Self { tracker, motion }
    }

    pub fn tracker(&self) -> &TargetTracker {
        &self.tracker
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.tracker.remaining(now)
    }

    pub fn reset_motion(&mut self, now: Instant) {
        self.motion.reset(now);
    }

    /// While the camera moves every frame reports [`EffectEvent::CameraMoving`]
    /// and the tracker holds no target; otherwise the tracker steps normally.
    pub fn step(&mut self, detections: &[Detection], now: Instant) -> Option<EffectEvent> {
        if self.motion.is_moving(now) {
            if self.tracker.mode().is_following() {
                log::info!("camera motion interrupted the effect");
            }
            self.tracker.hold_for_motion();
            return Some(EffectEvent::CameraMoving);
        }
        self.tracker.step(detections, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::tracking::domain::mode::Mode;
    use crate::tracking::domain::tracker_config::TrackerConfig;
    use std::sync::{Arc, Mutex};

    /// Replays a scripted motion sequence; still once exhausted.
    struct ScriptedMotion {
        script: Vec<bool>,
        resets: Arc<Mutex<usize>>,
    }

    impl CameraMotion for ScriptedMotion {
        fn is_moving(&mut self, _now: Instant) -> bool {
            if self.script.is_empty() {
                false
            } else {
                self.script.remove(0)
            }
        }

        fn reset(&mut self, _now: Instant) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    fn gated(script: Vec<bool>) -> (MotionGatedTracker, Arc<Mutex<usize>>) {
        let resets = Arc::new(Mutex::new(0));
        let motion = ScriptedMotion {
            script,
            resets: resets.clone(),
        };
        let tracker = TargetTracker::new(TrackerConfig::default());
        (MotionGatedTracker::new(tracker, Box::new(motion)), resets)
    }

    fn face() -> Vec<Detection> {
        vec![Detection::new(BoundingBox::new(0.1, 0.1, 0.4, 0.4), 0.95)]
    }

    #[test]
    fn test_still_camera_never_moves() {
        assert!(!StillCamera.is_moving(Instant::now()));
    }

    #[test]
    fn test_moving_camera_suppresses_acquisition() {
        let (mut gated, _) = gated(vec![true, true]);
        let now = Instant::now();
        assert_eq!(gated.step(&face(), now), Some(EffectEvent::CameraMoving));
        assert_eq!(gated.step(&face(), now), Some(EffectEvent::CameraMoving));
        assert_eq!(gated.tracker().mode(), Mode::Moving);
        assert!(gated.tracker().target().is_none());
    }

    #[test]
    fn test_motion_drops_existing_lock() {
        let (mut gated, _) = gated(vec![false, true]);
        let now = Instant::now();
        assert!(matches!(
            gated.step(&face(), now),
            Some(EffectEvent::EffectStart { .. })
        ));
        assert_eq!(gated.step(&face(), now), Some(EffectEvent::CameraMoving));
        assert!(gated.tracker().target().is_none());
    }

    #[test]
    fn test_first_still_frame_reacquires() {
        let (mut gated, _) = gated(vec![true]);
        let now = Instant::now();
        gated.step(&face(), now);
        assert!(matches!(
            gated.step(&face(), now),
            Some(EffectEvent::EffectStart { .. })
        ));
    }

    #[test]
    fn test_reset_motion_forwards_to_source() {
        let (mut gated, resets) = gated(vec![]);
        gated.reset_motion(Instant::now());
        assert_eq!(*resets.lock().unwrap(), 1);
    }
}
