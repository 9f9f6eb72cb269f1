//! Contains common, primitive types shared by every clock.
//!
//! This module defines the identifiers handed out by clocks and managers, the
//! counting direction, and the explicitly passed global step override. Using
//! distinct types keeps callback handles and clock handles from being mixed up.

use slotmap::new_key_type;
use std::fmt;
use uuid::Uuid;

new_key_type! {
    /// Uniquely and safely identifies a clock registered with a `ClockManager`.
    ///
    /// Keys are generational, so a key for an evicted clock never resolves to a
    /// clock added later in the same slot.
    pub struct ClockId;
}

/// The direction a clock counts in. Fixed when the clock is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Counts upward, as a stopwatch does.
    Up,
    /// Counts downward towards zero, as a timer does.
    Down,
}

/// Opaque handle for a callback registered on a single clock.
///
/// Handles are random tokens generated at registration time. They are only
/// meaningful for the clock that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(Uuid);

impl CallbackId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A step amount that, when positive, overrides every clock's own step.
///
/// The override is owned by a `ClockManager` and passed into each advance, so
/// there is no hidden process-wide state. A value of zero or below means
/// "no override" and each clock falls back to its cached step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlobalStep(pub i64);

impl GlobalStep {
    /// No override; every clock uses its own step.
    pub const NONE: GlobalStep = GlobalStep(0);

    /// Picks the step a clock should advance by this cycle.
    pub fn resolve(self, cached: i64) -> i64 {
        if self.0 > 0 {
            self.0
        } else {
            cached
        }
    }

    /// Returns `true` if this value actually overrides per-clock steps.
    pub fn is_override(self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_global_step_overrides_cached_step() {
        assert_eq!(GlobalStep(25).resolve(10), 25);
        assert!(GlobalStep(25).is_override());
    }

    #[test]
    fn non_positive_global_step_is_ignored() {
        assert_eq!(GlobalStep::NONE.resolve(10), 10);
        assert_eq!(GlobalStep(-5).resolve(10), 10);
        assert!(!GlobalStep(-5).is_override());
    }

    #[test]
    fn callback_ids_are_distinct() {
        let a = CallbackId::random();
        let b = CallbackId::random();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }
}
