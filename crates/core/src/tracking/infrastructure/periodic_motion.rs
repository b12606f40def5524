use std::time::{Duration, Instant};

use crate::tracking::domain::camera_motion::CameraMotion;

/// Stand-in for a camera on a pan/tilt rig: moves for `duration` at the
/// start of every `period`.
pub struct PeriodicMotion {
    period: Duration,
    duration: Duration,
    start: Instant,
}

impl PeriodicMotion {
    /// `period` must be non-zero.
    pub fn new(period: Duration, duration: Duration, start: Instant) -> Self {
        debug_assert!(!period.is_zero(), "motion period must be non-zero");
        Self {
            period,
            duration,
            start,
        }
    }
}

impl CameraMotion for PeriodicMotion {
    fn is_moving(&mut self, now: Instant) -> bool {
        let period = self.period.as_nanos();
        if period == 0 {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        elapsed % period < self.duration.as_nanos()
    }

    fn reset(&mut self, now: Instant) {
        log::info!("motion timer reset");
        self.start = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(0.0, true)]
    #[case::mid_motion(2.5, true)]
    #[case::motion_end(3.0, false)]
    #[case::still(9.9, false)]
    #[case::next_period(10.0, true)]
    #[case::second_still(14.0, false)]
    fn test_moves_at_start_of_each_period(#[case] at: f64, #[case] expected: bool) {
        let t0 = Instant::now();
        let mut motion = PeriodicMotion::new(Duration::from_secs(10), Duration::from_secs(3), t0);
        assert_eq!(motion.is_moving(t0 + Duration::from_secs_f64(at)), expected);
    }

    #[test]
    fn test_reset_restarts_period() {
        let t0 = Instant::now();
        let mut motion = PeriodicMotion::new(Duration::from_secs(10), Duration::from_secs(3), t0);
        let later = t0 + Duration::from_secs(5);
        assert!(!motion.is_moving(later));
        motion.reset(later);
        assert!(motion.is_moving(later + Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_duration_never_moves() {
        let t0 = Instant::now();
        let mut motion = PeriodicMotion::new(Duration::from_secs(10), Duration::ZERO, t0);
        assert!(!motion.is_moving(t0));
    }
}
