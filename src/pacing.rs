use std::time::{Duration, Instant};

pub const DEFAULT_MIN_INTERVAL_SECS: f64 = 1.0;

/// Time source for the pacer. The system clock is the only one used outside
/// tests; a fake clock keeps the pacing tests instant and exact.
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Enforces a minimum wall-clock interval between successive TSDR calls,
/// real or simulated. Sessions hold one behind `Arc<Mutex<_>>` so several
/// sessions can share a single budget.
pub struct Pacer {
    clock: Box<dyn Clock>,
    min_interval_secs: f64,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            last_call: None,
        }
    }

    /// A non-positive interval disables waiting entirely.
    pub fn set_interval(&mut self, secs: f64) {
        self.min_interval_secs = secs;
    }

    pub fn reset_interval(&mut self) {
        self.min_interval_secs = DEFAULT_MIN_INTERVAL_SECS;
    }

    pub fn interval(&self) -> f64 {
        self.min_interval_secs
    }

    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }

    /// Blocks until the minimum interval since the prior call has elapsed,
    /// then stamps "now" before the caller's operation begins. Time spent in
    /// the operation itself therefore counts toward the next call's wait,
    /// and the stamp advances even when the operation later fails.
    pub fn pace(&mut self) {
        if let Some(last) = self.last_call
            && self.min_interval_secs > 0.0
        {
            let due = last + Duration::from_secs_f64(self.min_interval_secs);
            let now = self.clock.now();
            if due > now {
                self.clock.sleep(due - now);
            }
        }
        self.last_call = Some(self.clock.now());
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}
