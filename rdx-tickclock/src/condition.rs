//! End conditions decide when a clock should be cancelled.
//!
//! A condition is consulted once per `tick()`, after the callbacks have run,
//! against the same snapshot they saw. Returning `true` cancels the clock,
//! exactly as if `cancel()` had been called.

use crate::snapshot::{StopwatchSnapshot, TimerSnapshot};

/// A predicate over a clock snapshot.
pub trait EndCondition<S>: Send + Sync {
    /// Returns `true` if the clock should be cancelled.
    fn should_end(&self, snapshot: &S) -> bool;
}

impl<S, F> EndCondition<S> for F
where
    F: Fn(&S) -> bool + Send + Sync,
{
    fn should_end(&self, snapshot: &S) -> bool {
        self(snapshot)
    }
}

/// Ends a timer once it reaches zero. Not attached by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerEndCondition;

impl EndCondition<TimerSnapshot> for TimerEndCondition {
    fn should_end(&self, snapshot: &TimerSnapshot) -> bool {
        snapshot.base.time <= 0
    }
}

/// Ends a stopwatch once it reaches its end time. Not attached by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopwatchEndCondition;

impl EndCondition<StopwatchSnapshot> for StopwatchEndCondition {
    fn should_end(&self, snapshot: &StopwatchSnapshot) -> bool {
        snapshot.base.time >= snapshot.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Direction;
    use crate::snapshot::ClockSnapshot;

    fn base(time: i64, direction: Direction) -> ClockSnapshot {
        ClockSnapshot {
            time,
            paused: false,
            direction,
            step: 1,
        }
    }

    #[test]
    fn timer_condition_ends_at_zero() {
        let running = TimerSnapshot { base: base(1, Direction::Down), length: 10 };
        let done = TimerSnapshot { base: base(0, Direction::Down), length: 10 };
        assert!(!TimerEndCondition.should_end(&running));
        assert!(TimerEndCondition.should_end(&done));
    }

    #[test]
    fn stopwatch_condition_ends_at_end_time() {
        let running = StopwatchSnapshot { base: base(99, Direction::Up), end_time: 100 };
        let done = StopwatchSnapshot { base: base(100, Direction::Up), end_time: 100 };
        assert!(!StopwatchEndCondition.should_end(&running));
        assert!(StopwatchEndCondition.should_end(&done));
    }

    #[test]
    fn closures_are_conditions() {
        let past_half = |s: &TimerSnapshot| s.base.time * 2 <= s.length;
        let snap = TimerSnapshot { base: base(40, Direction::Down), length: 100 };
        assert!(past_half.should_end(&snap));
    }
}
