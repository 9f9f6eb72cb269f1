//! A count-up clock with a ceiling.

use crate::clock::{Clock, ClockCore};
use crate::common::{Direction, GlobalStep};
use crate::error::{ensure_non_negative, ensure_positive_step, Result};
use crate::snapshot::StopwatchSnapshot;
use tracing::trace;

/// Counts up from a start time towards `end_time`.
///
/// Once the time has passed `end_time` the stopwatch stops advancing. Raising
/// the end time lets it continue.
pub struct Stopwatch {
    core: ClockCore<StopwatchSnapshot>,
    end_time: i64,
}

impl Stopwatch {
    /// Creates a paused stopwatch at zero that counts up by 1 per advance.
    pub fn new(end_time: i64) -> Self {
        Self {
            core: ClockCore::new(0, Direction::Up, 1),
            end_time,
        }
    }

    /// Creates a paused stopwatch at zero that counts up by `step` per advance.
    pub fn with_step(end_time: i64, step: i64) -> Result<Self> {
        Self::starting_at(0, end_time, step)
    }

    /// Creates a paused stopwatch that has already counted to `start`.
    pub fn starting_at(start: i64, end_time: i64, step: i64) -> Result<Self> {
        let start = ensure_non_negative("start time", start)?;
        let end_time = ensure_non_negative("end time", end_time)?;
        let step = ensure_positive_step(step)?;
        Ok(Self {
            core: ClockCore::new(start, Direction::Up, step),
            end_time,
        })
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Replaces the ceiling.
    ///
    /// Elapsed time is never rewound: lowering the end time below the current
    /// time leaves the time where it is and simply stops further counting.
    pub fn set_end_time(&mut self, end_time: i64) {
        self.end_time = end_time;
    }

    /// Whether the time has moved past the ceiling.
    pub fn is_frozen(&self) -> bool {
        self.core.time() > self.end_time
    }
}

impl Clock for Stopwatch {
    type Snapshot = StopwatchSnapshot;

    fn core(&self) -> &ClockCore<StopwatchSnapshot> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ClockCore<StopwatchSnapshot> {
        &mut self.core
    }

    fn create_snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            base: self.core.base_snapshot(),
            end_time: self.end_time,
        }
    }

    fn advance_count_with(&mut self, global: GlobalStep) {
        if self.is_frozen() {
            trace!(time = self.core.time(), end_time = self.end_time, "stopwatch frozen");
            return;
        }
        self.core.advance_count(global);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::StopwatchEndCondition;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn starts_at_zero_counting_up() {
        let watch = Stopwatch::with_step(1000, 100).unwrap();
        assert_eq!(watch.time(), 0);
        assert_eq!(watch.core().direction(), Direction::Up);
        assert!(watch.is_paused());
    }

    #[test]
    fn freezes_once_past_end_time() {
        let mut watch = Stopwatch::with_step(25, 10).unwrap();
        watch.advance_count();
        watch.advance_count();
        watch.advance_count();
        assert_eq!(watch.time(), 30);
        assert!(watch.is_frozen());
        for _ in 0..5 {
            watch.advance_count();
            assert_eq!(watch.time(), 30);
        }
    }

    #[test]
    fn counts_through_the_end_time_itself() {
        let mut watch = Stopwatch::with_step(20, 10).unwrap();
        watch.advance_count();
        watch.advance_count();
        assert_eq!(watch.time(), 20);
        assert!(!watch.is_frozen());
        watch.advance_count();
        assert_eq!(watch.time(), 30);
    }

    #[test]
    fn raising_end_time_resumes_counting() {
        let mut watch = Stopwatch::starting_at(50, 40, 5).unwrap();
        watch.advance_count();
        assert_eq!(watch.time(), 50);
        watch.set_end_time(100);
        watch.advance_count();
        assert_eq!(watch.time(), 55);
    }

    #[test]
    fn lowering_end_time_keeps_elapsed_time() {
        let mut watch = Stopwatch::starting_at(60, 100, 5).unwrap();
        watch.set_end_time(10);
        assert_eq!(watch.time(), 60);
        assert_eq!(watch.end_time(), 10);
        watch.advance_count();
        assert_eq!(watch.time(), 60);
    }

    #[test]
    fn up_comparison_keeps_firing_after_freeze() {
        let mut watch = Stopwatch::with_step(10, 10).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        // time >= last_run - interval holds whenever time has not gone
        // backwards, so a stalled count still fires on every tick.
        watch.add_callback(
            move |_: &StopwatchSnapshot| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            },
            1_000,
        );
        for _ in 0..4 {
            watch.tick();
            watch.advance_count();
        }
        assert_eq!(watch.time(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn default_end_condition_cancels_at_end_time() {
        let mut watch = Stopwatch::with_step(20, 10).unwrap();
        watch.set_end_condition(StopwatchEndCondition);
        watch.tick();
        watch.advance_count();
        watch.tick();
        assert!(!watch.is_cancelled());
        watch.advance_count();
        watch.tick();
        assert!(watch.is_cancelled());
    }

    #[test]
    fn snapshot_carries_end_time() {
        let watch = Stopwatch::starting_at(5, 80, 1).unwrap();
        let snapshot = watch.create_snapshot();
        assert_eq!(snapshot.end_time, 80);
        assert_eq!(snapshot.base.time, 5);
    }
}
