//! Hand-driven clock and timer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use progsched::time::{Clock, TimeoutHandle, Timer, TimerCallback};
use tokio::time::Instant;

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

struct PendingTimer {
    due: Instant,
    callback: TimerCallback,
    cancelled: Arc<AtomicBool>,
}

/// Timer that captures callbacks and fires them only on demand.
///
/// Due times are computed from the paired [`ManualClock`].
#[derive(Clone)]
pub struct ManualTimer {
    clock: ManualClock,
    pending: Arc<Mutex<Vec<PendingTimer>>>,
}

impl ManualTimer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Callbacks registered and not cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Callbacks registered so far, cancelled or not.
    pub fn registered_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Fire every non-cancelled callback due at the clock's current time.
    /// Returns how many fired.
    pub fn fire_due(&self) -> usize {
        let now = self.clock.now();
        self.fire_where(|t| !t.cancelled.load(Ordering::SeqCst) && t.due <= now)
    }

    /// Fire every non-cancelled callback regardless of its due time.
    pub fn fire_all(&self) -> usize {
        self.fire_where(|t| !t.cancelled.load(Ordering::SeqCst))
    }

    /// Fire everything, including cancelled callbacks, simulating a
    /// cancellation that lost the race against the timer.
    pub fn force_fire_all(&self) -> usize {
        self.fire_where(|_| true)
    }

    fn fire_where(&self, pred: impl Fn(&PendingTimer) -> bool) -> usize {
        // Callbacks run outside of our lock; they may schedule new timers.
        let to_fire: Vec<PendingTimer> = {
            let mut pending = self.pending.lock().unwrap();
            let (fire, keep) = pending.drain(..).partition(|t| pred(t));
            *pending = keep;
            fire
        };

        let fired = to_fire.len();
        for timer in to_fire {
            (timer.callback)();
        }
        fired
    }
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimer")
            .field("registered", &self.registered_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimeoutHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending.lock().unwrap().push(PendingTimer {
            due: self.clock.now() + delay,
            callback,
            cancelled: Arc::clone(&cancelled),
        });

        TimeoutHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}
