//! Continuous mode: repeat cycles on a fixed interval until shut down

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::{CycleReport, Orchestrator};
use crate::error::BtError;

/// Granularity of the shutdown check while sleeping between cycles
const SLEEP_SLICE: Duration = Duration::from_millis(100);

impl Orchestrator {
    /// Run cycles until the shutdown flag is raised.
    ///
    /// Errors end the current cycle only; they are logged and the next
    /// interval tries again, since a later revision may fix the stage files.
    /// `on_cycle` sees every completed cycle. Returns the total number of
    /// stages executed.
    pub fn run_continuous<F>(&self, mut on_cycle: F) -> usize
    where
        F: FnMut(&CycleReport),
    {
        info!(
            interval_secs = self.config.poll_interval.as_secs_f64(),
            max_parallel = self.config.max_parallel,
            "watching for revisions"
        );

        let mut total = 0;
        let mut last_revision: Option<String> = None;

        while !self.shutdown_requested() {
            match self.run_once() {
                Ok(report) => {
                    if last_revision.as_deref() != Some(report.revision.as_str()) {
                        info!(revision = %report.revision, "new revision");
                        last_revision = Some(report.revision.clone());
                    }
                    total += report.executed_count();
                    on_cycle(&report);
                }
                Err(BtError::Cancelled(what)) => {
                    debug!(%what, "cycle cancelled");
                    break;
                }
                Err(e) => error!(error = %e, "cycle failed"),
            }
            self.sleep_interval();
        }

        info!(executed = total, "stopped");
        total
    }

    /// Sleep for the poll interval, waking early on shutdown
    fn sleep_interval(&self) {
        let deadline = Instant::now() + self.config.poll_interval;
        while !self.shutdown_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
