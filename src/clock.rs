use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Source of the current instant. The engine never reads the system
/// clock directly so that tests can drive time deterministically.
pub trait Clock {
    fn now(&self) -> SystemTime;
}

/// Production clock backed by the OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for unit and integration tests.
///
/// Clones share the same underlying instant, so a test can hand one
/// handle to the engine and keep another to advance time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock().unwrap() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

/// Milliseconds from `start` to `end`, saturating to 0 if `end` is earlier.
pub fn millis_between(start: SystemTime, end: SystemTime) -> u64 {
    end.duration_since(start).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::default();
        let t0 = clock.now();

        clock.advance_ms(1500);
        assert_eq!(millis_between(t0, clock.now()), 1500);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let handle = clock.clone();

        handle.advance_ms(250);
        assert_eq!(millis_between(SystemTime::UNIX_EPOCH, clock.now()), 250);
    }

    #[test]
    fn millis_between_saturates_backwards() {
        let clock = ManualClock::default();
        let t0 = clock.now();
        clock.advance_ms(10);

        assert_eq!(millis_between(clock.now(), t0), 0);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b.duration_since(a).is_ok() || a.duration_since(b).unwrap() < Duration::from_secs(1));
    }
}
