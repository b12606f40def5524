use std::fmt;
use std::time::{Duration, Instant};

/// Tracker mode. Timed phases carry their own deadline, so a deadline can
/// only exist while the mode that owns it is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Idle,
    /// Camera reported as moving; no target may be held.
    Moving,
    EffectStart {
        deadline: Instant,
    },
    EffectRun {
        deadline: Instant,
    },
    EffectAbort {
        deadline: Instant,
    },
}

impl Mode {
    pub fn deadline(&self) -> Option<Instant> {
        match *self {
            Mode::Idle | Mode::Moving => None,
            Mode::EffectStart { deadline }
            | Mode::EffectRun { deadline }
            | Mode::EffectAbort { deadline } => Some(deadline),
        }
    }

    /// Time left in the current phase, zero once the deadline has passed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// True in the phases where a locked target is followed every frame.
    pub fn is_following(&self) -> bool {
        matches!(self, Mode::EffectStart { .. } | Mode::EffectRun { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Moving => "moving",
            Mode::EffectStart { .. } => "effect_start",
            Mode::EffectRun { .. } => "effect_run",
            Mode::EffectAbort { .. } => "effect_abort",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untimed_modes_have_no_deadline() {
        assert_eq!(Mode::Idle.deadline(), None);
        assert_eq!(Mode::Moving.remaining(Instant::now()), None);
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let now = Instant::now();
        let mode = Mode::EffectRun {
            deadline: now + Duration::from_secs(2),
        };
        assert_eq!(mode.remaining(now), Some(Duration::from_secs(2)));
        assert_eq!(
            mode.remaining(now + Duration::from_secs(5)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_is_following() {
        let deadline = Instant::now();
        assert!(Mode::EffectStart { deadline }.is_following());
        assert!(Mode::EffectRun { deadline }.is_following());
        assert!(!Mode::EffectAbort { deadline }.is_following());
        assert!(!Mode::Idle.is_following());
    }

    #[test]
    fn test_display_uses_wire_names() {
        assert_eq!(Mode::Idle.to_string(), "idle");
        let deadline = Instant::now();
        assert_eq!(Mode::EffectAbort { deadline }.to_string(), "effect_abort");
    }
}
