use std::time::{Duration, SystemTime};

/// Default cadence for the periodic stats refresh.
pub const LIVE_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Deadline-driven periodic timer behind the live stats display.
///
/// While a test is active this fires at a fixed cadence, independent of
/// keystroke arrival, so elapsed-time figures keep advancing during typing
/// pauses. At most one schedule is outstanding: `start` replaces any prior
/// one, `stop` tears it down so no further deadline can trip.
#[derive(Clone, Debug)]
pub struct LiveStatsTimer {
    interval: Duration,
    next_due: Option<SystemTime>,
}

impl LiveStatsTimer {
    pub fn new() -> Self {
        Self::with_interval(LIVE_STATS_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Begin (or restart) the periodic schedule from `now`.
    pub fn start(&mut self, now: SystemTime) {
        self.next_due = Some(now + self.interval);
    }

    /// Cancel the schedule; subsequent polls never fire.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// True when an interval has elapsed; rearms for the next one. Called
    /// from the host loop at tick cadence.
    pub fn poll(&mut self, now: SystemTime) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

impl Default for LiveStatsTimer {
    fn default() -> Self {
        Self::new()
    }
}
