//! Defines the notifications broadcast by a `ClockManager`.
//!
//! Subscribers receive these through `ClockManager::subscribe_events`. They
//! are informational only; dropping every receiver has no effect on the
//! manager.

use crate::common::ClockId;

/// Which variant a managed clock is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    Timer,
    Stopwatch,
}

/// Events related to the set of clocks held by a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    /// Fired when a clock is registered with the manager.
    ClockAdded { id: ClockId, kind: ClockKind },
    /// Fired when a clock is removed explicitly by the caller.
    ClockRemoved { id: ClockId },
    /// Fired when a pass finds a clock cancelled and evicts it.
    ClockEvicted { id: ClockId, time: i64 },
}
