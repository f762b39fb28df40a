use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime counters for the collector.
///
/// Purpose:
/// - Track attempts and per-attempt failures
/// - Track terminal outcomes per source
/// - Track escaped failures caught by the orchestrator guard
///
/// Design:
/// - Lock-free (Atomics)
/// - Monotonic for the lifetime of the process
#[derive(Default)]
pub struct RuntimeMetrics {
    pub runs_completed: AtomicUsize,

    // Attempt level
    pub attempts: AtomicUsize,
    pub attempt_failures: AtomicUsize,

    // Source level
    pub sources_collected: AtomicUsize,
    pub sources_exhausted: AtomicUsize,
    pub sources_cancelled: AtomicUsize,
    pub escaped_failures: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary, logged at the end of every run.
    pub fn summary(&self) -> String {
        format!(
            "runs={} attempts={} attempt_err={} collected={} exhausted={} cancelled={} escaped={}",
            self.runs_completed.load(Ordering::Relaxed),
            self.attempts.load(Ordering::Relaxed),
            self.attempt_failures.load(Ordering::Relaxed),
            self.sources_collected.load(Ordering::Relaxed),
            self.sources_exhausted.load(Ordering::Relaxed),
            self.sources_cancelled.load(Ordering::Relaxed),
            self.escaped_failures.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_counter() {
        let metrics = RuntimeMetrics::default();
        metrics.attempts.fetch_add(3, Ordering::Relaxed);
        metrics.sources_exhausted.fetch_add(1, Ordering::Relaxed);

        assert_eq!(
            metrics.summary(),
            "runs=0 attempts=3 attempt_err=0 collected=0 exhausted=1 cancelled=0 escaped=0"
        );
    }
}
