use crate::clock::{millis_between, Clock, SystemClock};
use crate::session::Session;
use serde::{Serialize, Serializer};
use std::time::{Duration, SystemTime};

/// Standard typing convention: one "word" is five characters.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Floor for the debounce delay; lower requests are raised, not rejected.
pub const MIN_UPDATE_FREQUENCY: Duration = Duration::from_millis(10);

/// Default debounce delay between a progress write and its notification.
pub const DEFAULT_UPDATE_FREQUENCY: Duration = Duration::from_millis(100);

/// Point-in-time view of a running (or idle) test.
///
/// Snapshots are plain values; consumers always treat the newest one as
/// authoritative, whether it arrived via the synchronous read path, the
/// debounced callback, or the live timer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub wpm: u32,
    pub accuracy: u32,
    pub characters_typed: usize,
    pub total_characters: usize,
    pub characters_remaining: usize,
    pub completion_percentage: f64,
    pub is_complete: bool,
    pub is_active: bool,
    #[serde(rename = "timeElapsed")]
    pub time_elapsed_ms: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
            characters_typed: 0,
            total_characters: 0,
            characters_remaining: 0,
            completion_percentage: 0.0,
            is_complete: false,
            is_active: false,
            time_elapsed_ms: 0,
        }
    }
}

/// Final figures for one finished test.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub wpm: u32,
    pub accuracy: u32,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub characters_typed: usize,
    pub total_characters: usize,
    #[serde(serialize_with = "epoch_millis_opt")]
    pub start_time: Option<SystemTime>,
    #[serde(serialize_with = "epoch_millis_opt")]
    pub end_time: Option<SystemTime>,
    pub is_complete: bool,
}

impl TestResult {
    /// Returned by `end_test` when no test was running.
    pub fn zero() -> Self {
        Self {
            wpm: 0,
            accuracy: 0,
            duration_ms: 0,
            characters_typed: 0,
            total_characters: 0,
            start_time: None,
            end_time: None,
            is_complete: false,
        }
    }
}

fn epoch_millis_opt<S: Serializer>(
    time: &Option<SystemTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_some(&millis_between(SystemTime::UNIX_EPOCH, *t)),
        None => serializer.serialize_none(),
    }
}

struct PendingNotify {
    due_at: SystemTime,
    notify: Box<dyn FnMut(Stats)>,
}

/// Single source of truth for how a typing test is going.
///
/// Owns the session lifecycle (idle -> active -> ended), the current
/// `(user_input, target_text)` pair, and the derivations over it. All
/// operations are synchronous; deferred work (the debounced notification)
/// is deadline-based and fires from `on_tick`, driven by the host loop.
pub struct MetricsEngine {
    session: Session,
    update_frequency: Duration,
    pending: Option<PendingNotify>,
    clock: Box<dyn Clock>,
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Build an engine over an injected clock. Tests pass a `ManualClock`
    /// handle and keep a clone to advance time deterministically.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            session: Session::default(),
            update_frequency: DEFAULT_UPDATE_FREQUENCY,
            pending: None,
            clock: Box::new(clock),
        }
    }

    /// Begin a fresh test, discarding any prior session (finished or not).
    /// Always succeeds; a previously scheduled notification is cancelled so
    /// it cannot fire into the new session.
    pub fn start_test(&mut self) {
        self.reset();
        self.session.started_at = Some(self.clock.now());
        self.session.active = true;
    }

    /// Finish the current test and return its final figures.
    ///
    /// If no test is active this returns the zero result rather than
    /// erroring. Final WPM and accuracy are computed from the frozen
    /// snapshot before the active flag drops, so the result reflects the
    /// speed during typing.
    pub fn end_test(&mut self) -> TestResult {
        if !self.session.active {
            return TestResult::zero();
        }

        let final_stats = self.stats_at(self.wpm_basis());
        let ended_at = self.clock.now();
        self.session.ended_at = Some(ended_at);
        self.session.active = false;

        let started_at = self.session.started_at;
        TestResult {
            wpm: final_stats.wpm,
            accuracy: final_stats.accuracy,
            duration_ms: started_at.map_or(0, |s| millis_between(s, ended_at)),
            characters_typed: final_stats.characters_typed,
            total_characters: final_stats.total_characters,
            start_time: started_at,
            end_time: Some(ended_at),
            is_complete: final_stats.is_complete,
        }
    }

    /// Record the latest typed/target pair. Ignored while no test is
    /// active, so stray updates can neither resurrect an ended session nor
    /// start one early. `None` inputs are treated as empty strings.
    pub fn update_progress(&mut self, user_input: Option<&str>, target_text: Option<&str>) {
        if !self.session.active {
            return;
        }
        self.session.user_input = user_input.unwrap_or_default().to_string();
        self.session.target_text = target_text.unwrap_or_default().to_string();
        self.session.last_update_at = Some(self.clock.now());
    }

    /// Same immediate write as `update_progress`, then schedule `notify`
    /// with a fresh snapshot once the debounce delay elapses. A newer call
    /// replaces any scheduled notification, so a burst of N updates inside
    /// one window delivers exactly one callback carrying the last state.
    pub fn update_progress_debounced(
        &mut self,
        user_input: Option<&str>,
        target_text: Option<&str>,
        notify: impl FnMut(Stats) + 'static,
    ) {
        if !self.session.active {
            return;
        }
        self.update_progress(user_input, target_text);
        self.pending = Some(PendingNotify {
            due_at: self.clock.now() + self.update_frequency,
            notify: Box::new(notify),
        });
    }

    /// Fire the scheduled notification if its deadline has passed. Called
    /// once per host-loop tick; a no-op when nothing is due.
    pub fn on_tick(&mut self) {
        let due = match &self.pending {
            Some(pending) => self.clock.now() >= pending.due_at,
            None => false,
        };
        if due {
            if let Some(mut pending) = self.pending.take() {
                (pending.notify)(self.current_stats());
            }
        }
    }

    /// Set the debounce delay, clamped to the 10 ms floor.
    pub fn set_update_frequency(&mut self, frequency: Duration) {
        self.update_frequency = frequency.max(MIN_UPDATE_FREQUENCY);
    }

    pub fn update_frequency(&self) -> Duration {
        self.update_frequency
    }

    /// Return to idle: all session state cleared, any scheduled
    /// notification cancelled.
    pub fn reset(&mut self) {
        self.session = Session::default();
        self.pending = None;
    }

    /// Snapshot of the current state. Pure read; repeated calls with no
    /// intervening writes (and no clock movement) are value-equal.
    ///
    /// WPM is computed as of the last progress write, not as of now, so a
    /// snapshot taken long after the final keystroke still reflects speed
    /// during active typing. `time_elapsed_ms` is wall-clock based and
    /// keeps advancing between keystrokes.
    pub fn current_stats(&self) -> Stats {
        self.stats_at(self.wpm_basis())
    }

    /// Snapshot with WPM computed as of the current instant. Used by the
    /// periodic live timer so the figure ticks down during typing pauses.
    pub fn stats_as_of_now(&self) -> Stats {
        self.stats_at(self.clock.now())
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.session.started_at
    }

    pub fn ended_at(&self) -> Option<SystemTime> {
        self.session.ended_at
    }

    pub(crate) fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Instant WPM is measured against: the last write if there was one,
    /// otherwise now.
    fn wpm_basis(&self) -> SystemTime {
        self.session.last_update_at.unwrap_or_else(|| self.clock.now())
    }

    fn stats_at(&self, wpm_as_of: SystemTime) -> Stats {
        let now = self.clock.now();
        let characters_typed = self.session.user_input.chars().count();
        let total_characters = self.session.target_text.chars().count();
        let characters_remaining = total_characters.saturating_sub(characters_typed);
        let completion_percentage = if total_characters > 0 {
            let raw = characters_typed as f64 / total_characters as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };
        let is_complete = characters_typed >= total_characters
            && self.session.user_input == self.session.target_text;

        Stats {
            wpm: self.wpm_at(wpm_as_of, characters_typed),
            accuracy: self.accuracy(characters_typed),
            characters_typed,
            total_characters,
            characters_remaining,
            completion_percentage,
            is_complete,
            is_active: self.session.active,
            time_elapsed_ms: match (self.session.active, self.session.started_at) {
                (true, Some(started)) => millis_between(started, now),
                _ => 0,
            },
        }
    }

    /// `(characters / 5) / minutes`, rounded. Zero while idle, before any
    /// input, or before any time has passed.
    fn wpm_at(&self, as_of: SystemTime, characters_typed: usize) -> u32 {
        let started = match self.session.started_at {
            Some(started) if self.session.active && characters_typed > 0 => started,
            _ => return 0,
        };
        let elapsed_ms = millis_between(started, as_of);
        if elapsed_ms == 0 {
            return 0;
        }
        let minutes = elapsed_ms as f64 / 60_000.0;
        ((characters_typed as f64 / CHARS_PER_WORD) / minutes).round() as u32
    }

    /// Percentage of typed characters matching the target at the same
    /// position. Rescans the full current pair on every call, which makes
    /// backspace-then-retype correct with no edit history. Characters typed
    /// past the end of the target inflate the denominator only, so
    /// overtyping is penalized rather than ignored. Empty input is 100.
    fn accuracy(&self, characters_typed: usize) -> u32 {
        if characters_typed == 0 {
            return 100;
        }
        let correct = self
            .session
            .user_input
            .chars()
            .zip(self.session.target_text.chars())
            .filter(|(typed, expected)| typed == expected)
            .count();
        ((correct as f64 / characters_typed as f64) * 100.0).round() as u32
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}
