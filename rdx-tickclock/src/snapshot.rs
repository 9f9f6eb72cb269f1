//! Immutable, read-only copies of clock state.
//!
//! A snapshot is taken once per `tick()` and handed to every eligible callback
//! and to the end condition. Snapshots are plain values: mutating the clock
//! after the fact never changes a snapshot already taken.

use crate::common::Direction;

/// Read access to the fields every snapshot carries.
pub trait Snapshot: Copy + Send + 'static {
    /// The clock's time at the moment the snapshot was taken.
    fn time(&self) -> i64;
    /// Whether the clock was paused when the snapshot was taken.
    fn is_paused(&self) -> bool;
    /// The clock's counting direction.
    fn direction(&self) -> Direction;
    /// The clock's cached step amount.
    fn step(&self) -> i64;
}

/// The fields shared by all clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub time: i64,
    pub paused: bool,
    pub direction: Direction,
    pub step: i64,
}

/// Snapshot of a `Timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub base: ClockSnapshot,
    /// The timer's nominal length.
    pub length: i64,
}

/// Snapshot of a `Stopwatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopwatchSnapshot {
    pub base: ClockSnapshot,
    /// The ceiling the stopwatch counts towards.
    pub end_time: i64,
}

impl Snapshot for ClockSnapshot {
    fn time(&self) -> i64 {
        self.time
    }
    fn is_paused(&self) -> bool {
        self.paused
    }
    fn direction(&self) -> Direction {
        self.direction
    }
    fn step(&self) -> i64 {
        self.step
    }
}

macro_rules! delegate_snapshot {
    ($ty:ty) => {
        impl Snapshot for $ty {
            fn time(&self) -> i64 {
                self.base.time
            }
            fn is_paused(&self) -> bool {
                self.base.paused
            }
            fn direction(&self) -> Direction {
                self.base.direction
            }
            fn step(&self) -> i64 {
                self.base.step
            }
        }
    };
}

delegate_snapshot!(TimerSnapshot);
delegate_snapshot!(StopwatchSnapshot);
