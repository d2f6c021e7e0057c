// Run metrics module
//
// Lightweight counters for a single export run, logged once at the end

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected while the pipeline runs
///
/// Uses atomics so steps can record through a shared reference.
#[derive(Debug)]
pub struct RunMetrics {
    /// External commands that finished with an accepted exit code
    pub commands_run: AtomicUsize,

    /// Accepted commands whose exit code was non-zero
    pub tolerated_exits: AtomicUsize,

    /// Entries that could not be removed while clearing a folder
    pub clear_failures: AtomicUsize,

    /// Time spent inside export steps in milliseconds
    pub step_time_ms: AtomicU64,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            commands_run: AtomicUsize::new(0),
            tolerated_exits: AtomicUsize::new(0),
            clear_failures: AtomicUsize::new(0),
            step_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one accepted command
    pub fn record_command(&self, tolerated: bool) {
        self.commands_run.fetch_add(1, Ordering::Relaxed);
        if tolerated {
            self.tolerated_exits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_clear_failures(&self, count: usize) {
        self.clear_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_step_time(&self, duration: Duration) {
        self.step_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn commands(&self) -> usize {
        self.commands_run.load(Ordering::Relaxed)
    }

    pub fn tolerated_exits(&self) -> usize {
        self.tolerated_exits.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Ran {} commands ({} with tolerated exit codes) in {:.2}s, {:.2}s inside export steps",
            self.commands(),
            self.tolerated_exits(),
            self.elapsed().as_secs_f64(),
            self.step_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
        let failures = self.clear_failures.load(Ordering::Relaxed);
        if failures > 0 {
            tracing::warn!("{} entries could not be removed while clearing folders", failures);
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_commands() {
        let metrics = RunMetrics::new();

        metrics.record_command(false);
        metrics.record_command(true);
        metrics.record_command(false);

        assert_eq!(metrics.commands(), 3);
        assert_eq!(metrics.tolerated_exits(), 1);
    }

    #[test]
    fn test_step_time_accumulates() {
        let metrics = RunMetrics::new();

        metrics.record_step_time(Duration::from_millis(100));
        metrics.record_step_time(Duration::from_millis(250));

        assert_eq!(metrics.step_time_ms.load(Ordering::Relaxed), 350);
    }

    #[test]
    fn test_clear_failures() {
        let metrics = RunMetrics::new();
        metrics.record_clear_failures(0);
        metrics.record_clear_failures(2);
        assert_eq!(metrics.clear_failures.load(Ordering::Relaxed), 2);
    }
}
