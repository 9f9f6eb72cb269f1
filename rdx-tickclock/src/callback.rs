//! Callback registrations and the per-tick eligibility rule.

use crate::common::Direction;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Logic run by a clock when one of its registrations becomes eligible.
///
/// Returning `false` mutes the registration until
/// `ClockCore::reset_callback_status` is called. Returning `true` keeps it live.
pub trait ClockCallback<S>: Send {
    /// Runs the callback against the snapshot taken for this tick.
    fn call(&mut self, snapshot: &S) -> bool;

    /// The interval used when the callback is registered without an explicit
    /// one. Expressed in the clock's own time unit.
    fn interval(&self) -> i64 {
        1
    }
}

impl<S, F> ClockCallback<S> for F
where
    F: FnMut(&S) -> bool + Send,
{
    fn call(&mut self, snapshot: &S) -> bool {
        self(snapshot)
    }
}

/// A type-erased callback as stored by a clock.
pub type BoxedCallback<S> = Box<dyn ClockCallback<S>>;

/// Binds a callback to its interval and run history.
pub struct CallbackRegistration<S> {
    callback: BoxedCallback<S>,
    interval: i64,
    last_run: i64,
    active: bool,
}

impl<S> CallbackRegistration<S> {
    pub(crate) fn new(callback: BoxedCallback<S>, interval: i64) -> Self {
        Self {
            callback,
            interval,
            last_run: 0,
            active: true,
        }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// The clock time at which this registration last fired. `0` means never.
    pub fn last_run(&self) -> i64 {
        self.last_run
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn callback(&self) -> &dyn ClockCallback<S> {
        self.callback.as_ref()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[cfg(test)]
    pub(crate) fn set_last_run(&mut self, last_run: i64) {
        self.last_run = last_run;
    }

    /// Whether this registration should fire at `time` on a clock counting in
    /// `direction`.
    ///
    /// A registration that never ran is always eligible. Otherwise the check is
    /// against `last_run - interval`: counting up fires while time has not
    /// dropped below that boundary, counting down fires once time has reached
    /// or passed it.
    pub fn is_eligible(&self, time: i64, direction: Direction) -> bool {
        if !self.active || self.interval <= 0 {
            return false;
        }
        if self.last_run == 0 {
            return true;
        }
        let boundary = self.last_run - self.interval;
        match direction {
            Direction::Up => time >= boundary,
            Direction::Down => time <= boundary,
        }
    }

    /// Records the run and invokes the callback, isolating a panic.
    ///
    /// The registration's `active` flag takes the callback's result. A panic
    /// mutes the registration and is returned as an error message.
    pub(crate) fn fire(&mut self, time: i64, snapshot: &S) -> Result<bool, String> {
        self.last_run = time;
        let callback = &mut self.callback;
        match panic::catch_unwind(AssertUnwindSafe(|| callback.call(snapshot))) {
            Ok(keep) => {
                self.active = keep;
                Ok(keep)
            }
            Err(payload) => {
                self.active = false;
                Err(panic_message(payload.as_ref()))
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(interval: i64, last_run: i64) -> CallbackRegistration<i64> {
        let mut reg = CallbackRegistration::<i64>::new(Box::new(|_: &i64| true), interval);
        reg.set_last_run(last_run);
        reg
    }

    #[test]
    fn never_run_registration_is_eligible() {
        let reg = registration(100, 0);
        assert!(reg.is_eligible(12_345, Direction::Down));
        assert!(reg.is_eligible(12_345, Direction::Up));
    }

    #[test]
    fn counting_down_fires_once_boundary_is_crossed() {
        let reg = registration(100, 500);
        assert!(reg.is_eligible(400, Direction::Down));
        assert!(reg.is_eligible(350, Direction::Down));
        assert!(!reg.is_eligible(450, Direction::Down));
    }

    #[test]
    fn counting_up_uses_permissive_boundary() {
        let reg = registration(100, 500);
        // Anything at or above last_run - interval qualifies, including times
        // that have not advanced a full interval since the last run.
        assert!(reg.is_eligible(400, Direction::Up));
        assert!(reg.is_eligible(510, Direction::Up));
        assert!(!reg.is_eligible(399, Direction::Up));
    }

    #[test]
    fn non_positive_interval_disables_registration() {
        assert!(!registration(0, 0).is_eligible(10, Direction::Up));
        assert!(!registration(-3, 0).is_eligible(10, Direction::Down));
    }

    #[test]
    fn fire_records_last_run_and_result() {
        let mut reg = CallbackRegistration::<i64>::new(Box::new(|t: &i64| *t < 50), 10);
        assert_eq!(reg.fire(40, &40), Ok(true));
        assert_eq!(reg.last_run(), 40);
        assert!(reg.is_active());

        assert_eq!(reg.fire(60, &60), Ok(false));
        assert!(!reg.is_active());
        assert!(!reg.is_eligible(60, Direction::Up));
    }

    #[test]
    fn panicking_callback_is_muted() {
        let mut reg = CallbackRegistration::<i64>::new(
            Box::new(|_: &i64| -> bool { panic!("boom") }),
            10,
        );
        let err = reg.fire(5, &5).unwrap_err();
        assert_eq!(err, "boom");
        assert!(!reg.is_active());
    }

    struct Every250;

    impl ClockCallback<i64> for Every250 {
        fn call(&mut self, _snapshot: &i64) -> bool {
            true
        }

        fn interval(&self) -> i64 {
            250
        }
    }

    #[test]
    fn declared_interval_defaults() {
        let closure = |_: &i64| true;
        assert_eq!(ClockCallback::<i64>::interval(&closure), 1);
        assert_eq!(Every250.interval(), 250);
    }
}
