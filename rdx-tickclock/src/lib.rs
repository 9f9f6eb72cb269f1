//! # Tickclock
//!
//! A deterministic, tick-driven timer and stopwatch engine for Rust.
//!
//! Tickclock models a clock as a counter that moves only when something drives
//! it. It never reads the wall clock: time is whatever unit the caller decides
//! (conventionally milliseconds) and advances by a fixed step per cycle.
//!
//! ## Core Concepts
//!
//! - **Two-phase cycle**: a driver calls `tick()` to run callbacks and the end
//!   condition against the current time, then `advance_count()` to move it.
//! - **Timer / Stopwatch**: a count-down clock with a length, and a count-up
//!   clock with an end time. Both implement the `Clock` trait.
//! - **Callbacks**: closures or `ClockCallback` implementors registered with an
//!   interval. Returning `false` mutes a callback until its status is reset.
//! - **End conditions**: predicates over a snapshot that cancel the clock.
//! - **Manager and driver**: a `ClockManager` owns a set of clocks and runs one
//!   pass at a time; a `ClockDriver` runs those passes on a tokio interval.
//!
//! ## Example Usage
//!
//! ```rust
//! use tickclock::prelude::*;
//!
//! let mut timer = Timer::with_step(1_000, 100).unwrap();
//! timer.add_callback(|snapshot: &TimerSnapshot| {
//!     println!("{} left of {}", snapshot.base.time, snapshot.length);
//!     true
//! }, 250);
//! timer.set_end_condition(TimerEndCondition);
//! timer.start();
//!
//! while !timer.is_cancelled() {
//!     timer.tick();
//!     timer.advance_count();
//! }
//! assert_eq!(timer.time(), 0);
//! ```

pub const ENGINE_NAME: &str = "Tickclock";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod callback;
pub mod clock;
pub mod common;
pub mod condition;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod manager;
pub mod snapshot;
pub mod stopwatch;
pub mod timer;

/// A prelude module for easy importing of the most common Tickclock types.
pub mod prelude {
    pub use crate::callback::ClockCallback;
    pub use crate::clock::{Clock, TickReport};
    pub use crate::common::{CallbackId, ClockId, Direction, GlobalStep};
    pub use crate::condition::{EndCondition, StopwatchEndCondition, TimerEndCondition};
    pub use crate::config::{ClockResolution, TickclockConfig};
    pub use crate::driver::ClockDriver;
    pub use crate::error::ClockError;
    pub use crate::events::{ClockEvent, ClockKind};
    pub use crate::manager::{ClockManager, ManagedClock, RunReport};
    pub use crate::snapshot::{ClockSnapshot, Snapshot, StopwatchSnapshot, TimerSnapshot};
    pub use crate::stopwatch::Stopwatch;
    pub use crate::timer::Timer;
}
