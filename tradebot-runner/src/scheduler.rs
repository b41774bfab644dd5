//! Live cadence loop.
//!
//! Runs one iteration, waits out the cadence, repeats. Cycles never overlap:
//! the next one starts only after the previous report is handed back. The
//! cancel flag is observed between cycles (including while waiting), never
//! inside one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tradebot_core::engine::{IterationReport, TradingIterationController};

/// Upper bound on one sleep slice while waiting for the next cycle.
const DEFAULT_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Scheduler {
    cadence: Duration,
    poll: Duration,
    max_cycles: Option<usize>,
}

impl Scheduler {
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            poll: DEFAULT_POLL,
            max_cycles: None,
        }
    }

    pub fn with_cadence_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours * 3600))
    }

    /// Stop on its own after `n` cycles.
    pub fn with_max_cycles(mut self, n: usize) -> Self {
        self.max_cycles = Some(n);
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Run cycles until cancelled or `max_cycles` is reached.
    ///
    /// `on_report` sees every report before the wait for the next cycle
    /// starts. Returns the number of cycles run.
    pub fn run(
        &self,
        controller: &mut TradingIterationController,
        cancel: &AtomicBool,
        mut on_report: impl FnMut(&IterationReport),
    ) -> usize {
        let mut cycles = 0usize;
        loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(cycles, "scheduler cancelled");
                break;
            }
            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            let started = Instant::now();
            let report = controller.run_iteration();
            cycles += 1;
            on_report(&report);

            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            let next = started + self.cadence;
            let wait = next.saturating_duration_since(Instant::now());
            tracing::info!(cycle = cycles, wait_secs = wait.as_secs(), "waiting for next cycle");
            self.wait_until(next, cancel);
        }
        cycles
    }

    fn wait_until(&self, deadline: Instant, cancel: &AtomicBool) {
        loop {
            let now = Instant::now();
            if now >= deadline || cancel.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep((deadline - now).min(self.poll));
        }
    }
}
