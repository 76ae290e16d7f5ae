use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Process-wide counters for one run.
///
/// Purpose:
/// - Summarize what a collection actually saw
/// - Make idle waits and malformed pushes visible in the final log line
///
/// Design:
/// - Lock-free (Atomics)
/// - Updated from the listener, the collector and the materializer
#[derive(Default)]
pub struct RuntimeMetrics {
    // Listener
    pub payloads_received: AtomicUsize,
    pub idle_waits: AtomicUsize,
    pub malformed_payloads: AtomicUsize,

    // Collector
    pub batches_completed: AtomicUsize,

    // Materializer
    pub problems_written: AtomicUsize,
}

impl RuntimeMetrics {
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line summary in the `key=value` style of the run log.
    pub fn summary(&self) -> String {
        format!(
            "recv={} idle={} malformed={} batches={} written={}",
            self.payloads_received.load(Ordering::Relaxed),
            self.idle_waits.load(Ordering::Relaxed),
            self.malformed_payloads.load(Ordering::Relaxed),
            self.batches_completed.load(Ordering::Relaxed),
            self.problems_written.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
