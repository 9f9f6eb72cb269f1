//! The tick/callback/end-condition engine shared by every clock.
//!
//! A clock is driven in two phases per external cycle: `tick()` evaluates the
//! callbacks and the end condition against the current time, then
//! `advance_count()` moves the time by one step. `ClockCore` owns the state
//! for both phases; the `Clock` trait is the capability interface that
//! `Timer` and `Stopwatch` implement on top of it.

use crate::callback::{panic_message, BoxedCallback, CallbackRegistration, ClockCallback};
use crate::common::{CallbackId, Direction, GlobalStep};
use crate::condition::EndCondition;
use crate::snapshot::{ClockSnapshot, Snapshot};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, trace, warn};

/// Upper bound on attempts to find an unused callback id.
///
/// Ids are random v4 UUIDs, so a single collision is already practically
/// unreachable; the cap only keeps the loop finite.
pub const MAX_ID_ATTEMPTS: usize = 16;

/// What happened during a single `tick()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Callbacks invoked this tick, including ones that panicked.
    pub fired: usize,
    /// Callbacks that panicked and were muted.
    pub failed: usize,
    /// Whether the end condition cancelled the clock.
    pub ended: bool,
}

/// State and logic common to all clocks.
pub struct ClockCore<S> {
    time: i64,
    direction: Direction,
    step: i64,
    paused: bool,
    cancelled: bool,
    registrations: HashMap<CallbackId, CallbackRegistration<S>>,
    end_condition: Option<Box<dyn EndCondition<S>>>,
}

// Engine logic.
impl<S: Snapshot> ClockCore<S> {
    /// Creates a paused, uncancelled core. `step` is expected to be positive;
    /// the public constructors of each clock validate it.
    pub(crate) fn new(time: i64, direction: Direction, step: i64) -> Self {
        Self {
            time: time.max(0),
            direction,
            step,
            paused: true,
            cancelled: false,
            registrations: HashMap::new(),
            end_condition: None,
        }
    }

    /// Whether a tick has anything to evaluate.
    pub fn needs_snapshot(&self) -> bool {
        !self.registrations.is_empty() || self.end_condition.is_some()
    }

    /// Copies the fields shared by every snapshot.
    pub fn base_snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            time: self.time,
            paused: self.paused,
            direction: self.direction,
            step: self.step,
        }
    }

    /// Runs every eligible callback, then the end condition, against `snapshot`.
    ///
    /// Callbacks run in no particular order. A panicking callback is muted and
    /// logged; the rest of the tick still runs. The end condition is evaluated
    /// on every tick, with or without registrations.
    pub fn tick(&mut self, snapshot: &S) -> TickReport {
        let mut report = TickReport::default();
        let time = self.time;
        let direction = self.direction;

        for (id, registration) in self.registrations.iter_mut() {
            if !registration.is_eligible(time, direction) {
                continue;
            }
            report.fired += 1;
            match registration.fire(time, snapshot) {
                Ok(true) => trace!(callback = %id, time, "callback fired"),
                Ok(false) => debug!(callback = %id, time, "callback muted itself"),
                Err(message) => {
                    report.failed += 1;
                    error!(callback = %id, time, %message, "callback panicked; muting it");
                }
            }
        }

        let verdict = self.end_condition.as_ref().map(|condition| {
            panic::catch_unwind(AssertUnwindSafe(|| condition.should_end(snapshot)))
        });
        match verdict {
            Some(Ok(true)) => {
                debug!(time, "end condition met; cancelling clock");
                self.cancel();
                report.ended = true;
            }
            Some(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                error!(time, %message, "end condition panicked; clock keeps running");
            }
            _ => {}
        }
        report
    }

    /// Moves the time by one step in the clock's direction.
    ///
    /// Counting down clamps at zero. `global` overrides the cached step when
    /// it is positive.
    pub fn advance_count(&mut self, global: GlobalStep) {
        let step = global.resolve(self.step);
        self.time = match self.direction {
            Direction::Up => self.time.saturating_add(step),
            Direction::Down => self.time.saturating_sub(step).max(0),
        };
    }
}

// Callback registration.
impl<S: Snapshot> ClockCore<S> {
    /// Registers `callback` to run every `interval` units of clock time.
    ///
    /// Returns `None` only if no unused id could be generated.
    pub fn add_callback<F>(&mut self, callback: F, interval: i64) -> Option<CallbackId>
    where
        F: FnMut(&S) -> bool + Send + 'static,
    {
        let boxed: BoxedCallback<S> = Box::new(callback);
        self.add_boxed_callback(Some(boxed), interval)
    }

    /// Registers a callback using the interval it declares.
    pub fn add_handler<C>(&mut self, handler: C) -> Option<CallbackId>
    where
        C: ClockCallback<S> + 'static,
    {
        let interval = handler.interval();
        let boxed: BoxedCallback<S> = Box::new(handler);
        self.add_boxed_callback(Some(boxed), interval)
    }

    /// Registers an already boxed callback.
    ///
    /// An absent callback registers nothing and yields `None`. A non-positive
    /// interval is accepted, but the registration never fires.
    pub fn add_boxed_callback(
        &mut self,
        callback: Option<BoxedCallback<S>>,
        interval: i64,
    ) -> Option<CallbackId> {
        let callback = callback?;
        let id = self.unused_callback_id()?;
        self.registrations
            .insert(id, CallbackRegistration::new(callback, interval));
        debug!(callback = %id, interval, "callback registered");
        Some(id)
    }

    fn unused_callback_id(&self) -> Option<CallbackId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = CallbackId::random();
            if !self.registrations.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        warn!(
            attempts = MAX_ID_ATTEMPTS,
            "could not generate an unused callback id"
        );
        None
    }

    /// Removes a registration. Unknown ids are ignored.
    ///
    /// Returns `true` if something was removed.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let removed = self.registrations.remove(&id).is_some();
        if removed {
            debug!(callback = %id, "callback removed");
        }
        removed
    }

    pub fn callback(&self, id: CallbackId) -> Option<&dyn ClockCallback<S>> {
        self.registrations.get(&id).map(|r| r.callback())
    }

    pub fn registration(&self, id: CallbackId) -> Option<&CallbackRegistration<S>> {
        self.registrations.get(&id)
    }

    pub fn callback_count(&self) -> usize {
        self.registrations.len()
    }

    /// Re-activates every muted registration without touching its run history.
    pub fn reset_callback_status(&mut self) {
        for registration in self.registrations.values_mut() {
            registration.set_active(true);
        }
    }

    pub fn set_end_condition<C>(&mut self, condition: C)
    where
        C: EndCondition<S> + 'static,
    {
        self.end_condition = Some(Box::new(condition));
    }

    pub fn clear_end_condition(&mut self) {
        self.end_condition = None;
    }

    pub fn end_condition(&self) -> Option<&dyn EndCondition<S>> {
        self.end_condition.as_deref()
    }
}

// Plain state accessors.
impl<S> ClockCore<S> {
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Sets the time directly. Negative values clamp to zero.
    pub fn set_time(&mut self, time: i64) {
        self.time = time.max(0);
    }

    pub fn add_time(&mut self, amount: i64) {
        self.time = self.time.saturating_add(amount).max(0);
    }

    /// Removes time directly, never going below zero.
    pub fn remove_time(&mut self, amount: i64) {
        self.time = self.time.saturating_sub(amount).max(0);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The cached step this clock was built with.
    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn unpause(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Marks the clock for eviction by whatever drives it.
    ///
    /// The mark can be lifted with `uncancel()` until a driver observes it.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn uncancel(&mut self) {
        self.cancelled = false;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// The capability interface shared by every clock variant.
///
/// Implementors provide access to their `ClockCore` and a way to build their
/// own snapshot type; everything else is provided.
pub trait Clock {
    type Snapshot: Snapshot;

    fn core(&self) -> &ClockCore<Self::Snapshot>;

    fn core_mut(&mut self) -> &mut ClockCore<Self::Snapshot>;

    /// Produces a fresh, independent copy of the clock's state.
    fn create_snapshot(&self) -> Self::Snapshot;

    /// Evaluates callbacks and the end condition for the current time.
    fn tick(&mut self) -> TickReport {
        if !self.core().needs_snapshot() {
            return TickReport::default();
        }
        let snapshot = self.create_snapshot();
        self.core_mut().tick(&snapshot)
    }

    /// Advances by the clock's own step.
    fn advance_count(&mut self) {
        self.advance_count_with(GlobalStep::NONE);
    }

    /// Advances by `global` if it is positive, otherwise by the clock's step.
    fn advance_count_with(&mut self, global: GlobalStep) {
        self.core_mut().advance_count(global);
    }

    fn add_callback<F>(&mut self, callback: F, interval: i64) -> Option<CallbackId>
    where
        F: FnMut(&Self::Snapshot) -> bool + Send + 'static,
        Self: Sized,
    {
        self.core_mut().add_callback(callback, interval)
    }

    fn add_handler<C>(&mut self, handler: C) -> Option<CallbackId>
    where
        C: ClockCallback<Self::Snapshot> + 'static,
        Self: Sized,
    {
        self.core_mut().add_handler(handler)
    }

    fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.core_mut().remove_callback(id)
    }

    fn reset_callback_status(&mut self) {
        self.core_mut().reset_callback_status();
    }

    fn set_end_condition<C>(&mut self, condition: C)
    where
        C: EndCondition<Self::Snapshot> + 'static,
        Self: Sized,
    {
        self.core_mut().set_end_condition(condition);
    }

    fn time(&self) -> i64 {
        self.core().time()
    }

    fn set_time(&mut self, time: i64) {
        self.core_mut().set_time(time);
    }

    fn add_time(&mut self, amount: i64) {
        self.core_mut().add_time(amount);
    }

    fn remove_time(&mut self, amount: i64) {
        self.core_mut().remove_time(amount);
    }

    /// Unpauses the clock. It only advances while something drives it.
    fn start(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.core_mut().unpause();
        self
    }

    fn pause(&mut self) {
        self.core_mut().pause();
    }

    fn unpause(&mut self) {
        self.core_mut().unpause();
    }

    fn is_paused(&self) -> bool {
        self.core().is_paused()
    }

    fn cancel(&mut self) {
        self.core_mut().cancel();
    }

    fn uncancel(&mut self) {
        self.core_mut().uncancel();
    }

    fn is_cancelled(&self) -> bool {
        self.core().is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn core(time: i64, direction: Direction, step: i64) -> ClockCore<ClockSnapshot> {
        ClockCore::new(time, direction, step)
    }

    fn tick(core: &mut ClockCore<ClockSnapshot>) -> TickReport {
        let snapshot = core.base_snapshot();
        core.tick(&snapshot)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(&ClockSnapshot) -> bool + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move |_: &ClockSnapshot| {
            handle.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    #[test]
    fn new_core_starts_paused_and_active() {
        let core = core(10, Direction::Up, 1);
        assert!(core.is_paused());
        assert!(!core.is_cancelled());
        assert!(!core.needs_snapshot());
    }

    #[test]
    fn counting_down_clamps_at_zero() {
        let mut core = core(5, Direction::Down, 3);
        core.advance_count(GlobalStep::NONE);
        assert_eq!(core.time(), 2);
        for _ in 0..10 {
            core.advance_count(GlobalStep::NONE);
            assert_eq!(core.time(), 0);
        }
    }

    #[test]
    fn global_step_overrides_only_when_positive() {
        let mut core = core(0, Direction::Up, 10);
        core.advance_count(GlobalStep(50));
        assert_eq!(core.time(), 50);
        core.advance_count(GlobalStep(-1));
        assert_eq!(core.time(), 60);
    }

    #[test]
    fn absent_callback_is_rejected() {
        let mut core = core(0, Direction::Up, 1);
        assert_eq!(core.add_boxed_callback(None, 10), None);
        assert_eq!(core.callback_count(), 0);
    }

    #[test]
    fn remove_callback_is_idempotent() {
        let mut core = core(0, Direction::Up, 1);
        let id = core.add_callback(|_: &ClockSnapshot| true, 10).unwrap();
        assert!(core.callback(id).is_some());
        assert!(core.remove_callback(id));
        assert!(!core.remove_callback(id));
        assert!(core.callback(id).is_none());
    }

    #[test]
    fn muted_callback_waits_for_reset() {
        let mut core = core(100, Direction::Down, 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        core.add_callback(
            move |_: &ClockSnapshot| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            },
            1,
        );

        for _ in 0..5 {
            tick(&mut core);
            core.advance_count(GlobalStep::NONE);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        core.reset_callback_status();
        tick(&mut core);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_callback_does_not_abort_tick() {
        let mut core = core(10, Direction::Up, 1);
        let (count, callback) = counter();
        core.add_callback(|_: &ClockSnapshot| -> bool { panic!("bad callback") }, 1);
        core.add_callback(callback, 1);
        core.set_end_condition(|s: &ClockSnapshot| s.time >= 10);

        let report = tick(&mut core);
        assert_eq!(report.fired, 2);
        assert_eq!(report.failed, 1);
        assert!(report.ended);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(core.is_cancelled());
    }

    #[test]
    fn end_condition_runs_without_registrations() {
        let mut core = core(0, Direction::Down, 1);
        core.set_end_condition(|s: &ClockSnapshot| s.time <= 0);
        assert!(core.needs_snapshot());
        let report = tick(&mut core);
        assert!(report.ended);
        assert!(core.is_cancelled());
    }

    #[test]
    fn panicking_end_condition_keeps_clock_running() {
        let mut core = core(0, Direction::Down, 1);
        core.set_end_condition(|_: &ClockSnapshot| -> bool { panic!("bad condition") });
        let report = tick(&mut core);
        assert!(!report.ended);
        assert!(!core.is_cancelled());
    }

    #[test]
    fn direct_time_mutation_never_goes_negative() {
        let mut core = core(10, Direction::Down, 1);
        core.remove_time(25);
        assert_eq!(core.time(), 0);
        core.add_time(7);
        assert_eq!(core.time(), 7);
        core.set_time(-4);
        assert_eq!(core.time(), 0);
    }

    #[test]
    fn cancel_can_be_withdrawn() {
        let mut core = core(0, Direction::Up, 1);
        core.cancel();
        assert!(core.is_cancelled());
        core.uncancel();
        assert!(!core.is_cancelled());
    }
}
