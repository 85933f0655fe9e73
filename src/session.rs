use crate::live::LiveStatsTimer;
use crate::metrics::{MetricsEngine, Stats, TestResult};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Mutable state of one start-to-end typing attempt. Owned and mutated
/// exclusively by the engine; `active` is true strictly between start and
/// end.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub started_at: Option<std::time::SystemTime>,
    pub ended_at: Option<std::time::SystemTime>,
    pub active: bool,
    pub user_input: String,
    pub target_text: String,
    pub last_update_at: Option<std::time::SystemTime>,
}

/// Glue between the engine and a display layer.
///
/// Owns the engine, the periodic live-stats timer, and the latest
/// published snapshot. Progress writes refresh the snapshot immediately;
/// the debounced path and the 1 Hz timer refresh it from `on_tick`, so a
/// host loop only has to feed events in and render `stats()` out.
///
/// Debounced notifications travel over an mpsc channel and are drained on
/// tick; whichever snapshot arrives last wins.
pub struct TestSession {
    engine: MetricsEngine,
    live: LiveStatsTimer,
    stats: Stats,
    tx: Sender<Stats>,
    rx: Receiver<Stats>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::with_engine(MetricsEngine::new())
    }

    pub fn with_engine(engine: MetricsEngine) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            engine,
            live: LiveStatsTimer::new(),
            stats: Stats::default(),
            tx,
            rx,
        }
    }

    /// Latest published snapshot.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    /// Start a fresh test and the live refresh that goes with it.
    pub fn start_test(&mut self) {
        self.engine.start_test();
        self.live.start(self.engine.now());
        self.drain_notifications();
        self.stats = self.engine.current_stats();
    }

    /// End the test, tear down the live refresh, and return the final
    /// figures. Safe to call when idle (returns the zero result).
    pub fn end_test(&mut self) -> TestResult {
        let result = self.engine.end_test();
        self.live.stop();
        self.stats = self.engine.current_stats();
        result
    }

    /// Feed the latest typed/target pair through the debounced path while
    /// refreshing the published snapshot immediately, so the display is
    /// never behind the synchronous read.
    pub fn update_progress(&mut self, user_input: Option<&str>, target_text: Option<&str>) {
        if !self.engine.is_active() {
            return;
        }
        let tx = self.tx.clone();
        self.engine
            .update_progress_debounced(user_input, target_text, move |stats| {
                let _ = tx.send(stats);
            });
        self.stats = self.engine.current_stats();
    }

    /// Advance deferred work one tick: fire a due debounced notification,
    /// absorb whatever it delivered, and run the periodic refresh.
    /// Returns true when the published snapshot changed.
    pub fn on_tick(&mut self) -> bool {
        let before = self.stats.clone();

        self.engine.on_tick();
        if let Some(latest) = self.drain_notifications() {
            self.stats = latest;
        }
        if self.live.poll(self.engine.now()) && self.engine.is_active() {
            self.stats = self.engine.stats_as_of_now();
        }

        self.stats != before
    }

    /// Back to idle: engine cleared, live refresh stopped, stale
    /// notifications discarded, snapshot back to its initial shape.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.live.stop();
        self.drain_notifications();
        self.stats = Stats::default();
    }

    pub fn set_update_frequency(&mut self, frequency: Duration) {
        self.engine.set_update_frequency(frequency);
    }

    fn drain_notifications(&mut self) -> Option<Stats> {
        let mut latest = None;
        while let Ok(stats) = self.rx.try_recv() {
            latest = Some(stats);
        }
        latest
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}
