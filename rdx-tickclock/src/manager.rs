//! An explicitly owned registry of clocks and the single-pass routine that
//! drives them.

use crate::clock::{Clock, TickReport};
use crate::common::{ClockId, GlobalStep};
use crate::config::TickclockConfig;
use crate::error::{ensure_positive_step, Result};
use crate::events::{ClockEvent, ClockKind};
use crate::stopwatch::Stopwatch;
use crate::timer::Timer;
use slotmap::SlotMap;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The closed set of clocks a manager can hold.
pub enum ManagedClock {
    Timer(Timer),
    Stopwatch(Stopwatch),
}

macro_rules! each_clock {
    ($self:expr, $clock:ident => $body:expr) => {
        match $self {
            ManagedClock::Timer($clock) => $body,
            ManagedClock::Stopwatch($clock) => $body,
        }
    };
}

impl ManagedClock {
    pub fn kind(&self) -> ClockKind {
        match self {
            ManagedClock::Timer(_) => ClockKind::Timer,
            ManagedClock::Stopwatch(_) => ClockKind::Stopwatch,
        }
    }

    pub fn tick(&mut self) -> TickReport {
        each_clock!(self, clock => clock.tick())
    }

    pub fn advance_count_with(&mut self, global: GlobalStep) {
        each_clock!(self, clock => clock.advance_count_with(global))
    }

    pub fn time(&self) -> i64 {
        each_clock!(self, clock => clock.time())
    }

    pub fn step(&self) -> i64 {
        each_clock!(self, clock => clock.core().step())
    }

    pub fn callback_count(&self) -> usize {
        each_clock!(self, clock => clock.core().callback_count())
    }

    pub fn is_paused(&self) -> bool {
        each_clock!(self, clock => clock.is_paused())
    }

    pub fn pause(&mut self) {
        each_clock!(self, clock => clock.pause())
    }

    pub fn unpause(&mut self) {
        each_clock!(self, clock => clock.unpause())
    }

    pub fn is_cancelled(&self) -> bool {
        each_clock!(self, clock => clock.is_cancelled())
    }

    pub fn cancel(&mut self) {
        each_clock!(self, clock => clock.cancel())
    }

    pub fn uncancel(&mut self) {
        each_clock!(self, clock => clock.uncancel())
    }

    pub fn as_timer_mut(&mut self) -> Option<&mut Timer> {
        match self {
            ManagedClock::Timer(timer) => Some(timer),
            ManagedClock::Stopwatch(_) => None,
        }
    }

    pub fn as_stopwatch_mut(&mut self) -> Option<&mut Stopwatch> {
        match self {
            ManagedClock::Stopwatch(stopwatch) => Some(stopwatch),
            ManagedClock::Timer(_) => None,
        }
    }
}

impl From<Timer> for ManagedClock {
    fn from(timer: Timer) -> Self {
        ManagedClock::Timer(timer)
    }
}

impl From<Stopwatch> for ManagedClock {
    fn from(stopwatch: Stopwatch) -> Self {
        ManagedClock::Stopwatch(stopwatch)
    }
}

/// What a single `run_once` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Clocks that were ticked.
    pub ticked: usize,
    /// Paused clocks that were skipped.
    pub skipped: usize,
    /// Callbacks invoked across all clocks.
    pub fired: usize,
    /// Callbacks that panicked across all clocks.
    pub failed: usize,
    /// Clocks found cancelled after their tick and dropped.
    pub evicted: Vec<ClockId>,
}

/// Owns a collection of clocks and drives them one pass at a time.
///
/// The manager holds the step used by its factory methods and the global step
/// override applied on every pass. Nothing here is process-wide: create a
/// manager and hand it to whatever drives it.
pub struct ClockManager {
    clocks: SlotMap<ClockId, ManagedClock>,
    count_amount: i64,
    global_step: GlobalStep,
    event_sender: broadcast::Sender<ClockEvent>,
}

impl ClockManager {
    /// Creates an empty manager from the given configuration.
    pub fn new(config: &TickclockConfig) -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            clocks: SlotMap::with_key(),
            count_amount: config.count_amount(),
            global_step: config.global_step(),
            event_sender,
        }
    }

    /// Runs one pass over every clock.
    ///
    /// Paused clocks are skipped. Every other clock is ticked; if it is
    /// cancelled afterwards it is evicted, otherwise it advances by one step.
    /// Evictions are applied after the pass, so a clock cancelled during its
    /// own tick never disturbs iteration.
    pub fn run_once(&mut self) -> RunReport {
        let mut report = RunReport::default();
        let global_step = self.global_step;

        for (id, clock) in self.clocks.iter_mut() {
            if clock.is_paused() {
                report.skipped += 1;
                continue;
            }
            let tick = clock.tick();
            report.ticked += 1;
            report.fired += tick.fired;
            report.failed += tick.failed;

            if clock.is_cancelled() {
                report.evicted.push(id);
            } else {
                clock.advance_count_with(global_step);
            }
        }

        for &id in &report.evicted {
            if let Some(clock) = self.clocks.remove(id) {
                let time = clock.time();
                info!(?id, time, "evicted cancelled clock");
                self.event_sender
                    .send(ClockEvent::ClockEvicted { id, time })
                    .ok();
            }
        }
        trace!(
            ticked = report.ticked,
            skipped = report.skipped,
            evicted = report.evicted.len(),
            "pass complete"
        );
        report
    }
}

// Public API implementation block.
impl ClockManager {
    /// Registers an existing clock with this manager.
    pub fn add_clock(&mut self, clock: impl Into<ManagedClock>) -> ClockId {
        let clock = clock.into();
        let kind = clock.kind();
        let id = self.clocks.insert(clock);
        debug!(?id, ?kind, "clock added");
        self.event_sender
            .send(ClockEvent::ClockAdded { id, kind })
            .ok();
        id
    }

    /// Removes a clock, returning it if it was present.
    pub fn remove_clock(&mut self, id: ClockId) -> Option<ManagedClock> {
        let removed = self.clocks.remove(id);
        if removed.is_some() {
            debug!(?id, "clock removed");
            self.event_sender
                .send(ClockEvent::ClockRemoved { id })
                .ok();
        }
        removed
    }

    /// Creates a timer counting by this manager's step and registers it.
    pub fn create_timer(&mut self, length: i64) -> Result<ClockId> {
        let timer = Timer::with_step(length, self.count_amount)?;
        Ok(self.add_clock(timer))
    }

    /// Creates a stopwatch counting by this manager's step and registers it.
    pub fn create_stopwatch(&mut self, end_time: i64) -> Result<ClockId> {
        let stopwatch = Stopwatch::with_step(end_time, self.count_amount)?;
        Ok(self.add_clock(stopwatch))
    }

    pub fn clock(&self, id: ClockId) -> Option<&ManagedClock> {
        self.clocks.get(id)
    }

    pub fn clock_mut(&mut self, id: ClockId) -> Option<&mut ManagedClock> {
        self.clocks.get_mut(id)
    }

    pub fn timer_mut(&mut self, id: ClockId) -> Option<&mut Timer> {
        self.clocks.get_mut(id).and_then(ManagedClock::as_timer_mut)
    }

    pub fn stopwatch_mut(&mut self, id: ClockId) -> Option<&mut Stopwatch> {
        self.clocks.get_mut(id).and_then(ManagedClock::as_stopwatch_mut)
    }

    pub fn contains(&self, id: ClockId) -> bool {
        self.clocks.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ClockId> {
        self.clocks.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClockId, &ManagedClock)> + '_ {
        self.clocks.iter()
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// The step given to clocks created by the factory methods.
    pub fn count_amount(&self) -> i64 {
        self.count_amount
    }

    /// Changes the step for clocks created from now on. Existing clocks keep
    /// the step they cached.
    pub fn set_count_amount(&mut self, count_amount: i64) -> Result<()> {
        self.count_amount = ensure_positive_step(count_amount)?;
        Ok(())
    }

    pub fn global_step(&self) -> GlobalStep {
        self.global_step
    }

    pub fn set_global_step(&mut self, global_step: GlobalStep) {
        self.global_step = global_step;
    }

    /// Subscribes to the `ClockEvent` stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClockEvent> {
        self.event_sender.subscribe()
    }
}

impl Default for ClockManager {
    fn default() -> Self {
        Self::new(&TickclockConfig::default())
    }
}
