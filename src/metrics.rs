use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing analysis activity.
#[derive(Default)]
pub struct AnalysisMetrics {
    single_analyses: AtomicU64,
    batch_analyses: AtomicU64,
    summaries: AtomicU64,
    files_extracted: AtomicU64,
    extraction_failures: AtomicU64,
    backend_failures: AtomicU64,
}

impl AnalysisMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed single-file analysis.
    pub fn record_single(&self) {
        self.single_analyses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed batch analysis.
    pub fn record_batch(&self) {
        self.batch_analyses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed summary.
    pub fn record_summary(&self) {
        self.summaries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one extraction attempt.
    pub fn record_extraction(&self, succeeded: bool) {
        if succeeded {
            self.files_extracted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.extraction_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed, timed-out, or rejected backend call.
    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            single_analyses: self.single_analyses.load(Ordering::Relaxed),
            batch_analyses: self.batch_analyses.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
            files_extracted: self.files_extracted.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of analysis counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Successful single-file analyses since startup.
    pub single_analyses: u64,
    /// Successful multi-file analyses since startup.
    pub batch_analyses: u64,
    /// Successful summaries since startup.
    pub summaries: u64,
    /// Files whose content was extracted.
    pub files_extracted: u64,
    /// Files whose extraction failed or whose bytes could not be loaded.
    pub extraction_failures: u64,
    /// Backend calls that did not produce an answer.
    pub backend_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_counter_independently() {
        let metrics = AnalysisMetrics::new();
        metrics.record_single();
        metrics.record_batch();
        metrics.record_batch();
        metrics.record_extraction(true);
        metrics.record_extraction(true);
        metrics.record_extraction(false);
        metrics.record_backend_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.single_analyses, 1);
        assert_eq!(snapshot.batch_analyses, 2);
        assert_eq!(snapshot.summaries, 0);
        assert_eq!(snapshot.files_extracted, 2);
        assert_eq!(snapshot.extraction_failures, 1);
        assert_eq!(snapshot.backend_failures, 1);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        assert_eq!(AnalysisMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
