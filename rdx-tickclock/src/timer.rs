//! A count-down clock with a nominal length.

use crate::clock::{Clock, ClockCore};
use crate::common::Direction;
use crate::error::{ensure_non_negative, ensure_positive_step, Result};
use crate::snapshot::TimerSnapshot;

/// Counts down from `length` towards zero.
pub struct Timer {
    core: ClockCore<TimerSnapshot>,
    length: i64,
}

impl Timer {
    /// Creates a paused timer of `length` that counts down by 1 per advance.
    ///
    /// A negative length is treated as zero.
    pub fn new(length: i64) -> Self {
        let length = length.max(0);
        Self {
            core: ClockCore::new(length, Direction::Down, 1),
            length,
        }
    }

    /// Creates a paused timer that counts down by `step` per advance.
    pub fn with_step(length: i64, step: i64) -> Result<Self> {
        let length = ensure_non_negative("length", length)?;
        let step = ensure_positive_step(step)?;
        Ok(Self {
            core: ClockCore::new(length, Direction::Down, step),
            length,
        })
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    /// Puts the time back to the full length.
    pub fn reset(&mut self) {
        self.core.set_time(self.length);
    }

    /// Changes the length while keeping the time already elapsed.
    ///
    /// A timer of length 1000 at time 400 has 600 elapsed; setting the length
    /// to 1500 leaves it at 900. The time never drops below zero.
    pub fn set_length(&mut self, length: i64) {
        let elapsed = self.length.saturating_sub(self.core.time());
        self.length = length.max(0);
        self.core.set_time(self.length.saturating_sub(elapsed).max(0));
    }

    /// Changes the length and discards the time already elapsed.
    pub fn set_length_and_reset(&mut self, length: i64) {
        self.length = length.max(0);
        self.reset();
    }

    pub fn add_length(&mut self, amount: i64) {
        self.set_length(self.length.saturating_add(amount));
    }

    /// Shortens the timer. The reduction is capped at the current length.
    pub fn remove_length(&mut self, amount: i64) {
        let amount = amount.min(self.length);
        self.set_length(self.length.saturating_sub(amount));
    }
}

impl Clock for Timer {
    type Snapshot = TimerSnapshot;

    fn core(&self) -> &ClockCore<TimerSnapshot> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ClockCore<TimerSnapshot> {
        &mut self.core
    }

    fn create_snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            base: self.core.base_snapshot(),
            length: self.length,
        }
    }
}
