//! Cancellable periodic clock
//!
//! `PlaybackClock` does not own a thread or a timer. It records the active
//! schedule and answers two questions for the host loop: when is the next
//! tick due, and has it fired yet. Keeping the clock passive means every
//! tick runs on the same thread as the user actions that mutate the engine.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shortest interval the clock will accept
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Source of the current time for engines and clocks
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Time source following tokio's clock, which tests can pause and advance.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTime;

impl TimeSource for TokioTime {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Manually advanced time source
#[derive(Clone, Debug)]
pub struct ManualTime {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

/// Identifies one `schedule` call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockHandle(u64);

#[derive(Debug)]
struct Schedule {
    handle: ClockHandle,
    interval: Duration,
    next_due: Instant,
}

/// Repeating tick schedule with at most one active schedule
#[derive(Debug, Default)]
pub struct PlaybackClock {
    active: Option<Schedule>,
    issued: u64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval` from `now`, replacing any prior schedule.
    pub fn schedule(&mut self, interval: Duration, now: Instant) -> ClockHandle {
        self.issued += 1;
        let handle = ClockHandle(self.issued);
        let interval = interval.max(MIN_INTERVAL);
        self.active = Some(Schedule {
            handle,
            interval,
            next_due: now + interval,
        });
        handle
    }

    /// Cancel whatever is scheduled. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Cancel only if `handle` is still the active schedule.
    pub fn cancel_handle(&mut self, handle: ClockHandle) {
        if self.handle() == Some(handle) {
            self.active = None;
        }
    }

    /// Change the interval used after the pending tick. The pending tick keeps
    /// its due time, so elapsed time is never adjusted retroactively.
    pub fn set_interval(&mut self, interval: Duration) {
        if let Some(schedule) = self.active.as_mut() {
            schedule.interval = interval.max(MIN_INTERVAL);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn handle(&self) -> Option<ClockHandle> {
        self.active.as_ref().map(|s| s.handle)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.active.as_ref().map(|s| s.interval)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.active.as_ref().map(|s| s.next_due)
    }

    /// Fire the pending tick if it is due.
    ///
    /// At most one tick fires per call. If the host fell behind by several
    /// intervals (suspended, backgrounded) the missed ticks are dropped rather
    /// than replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(schedule) = self.active.as_mut() else {
            return false;
        };
        if now < schedule.next_due {
            return false;
        }

        let on_time = schedule.next_due + schedule.interval;
        schedule.next_due = if on_time > now {
            on_time
        } else {
            now + schedule.interval
        };
        true
    }
}
