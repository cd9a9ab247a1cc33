//! Run metrics for the validator
//!
//! - Counters only
//! - Monotonic within one run; each run owns its own registry
//! - Thread-safe but lock-free, `Relaxed` ordering

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one validation run.
///
/// # Thread Safety
///
/// Incremented from the worker thread, pool batches and the main thread at
/// once. Values are exact once the run has finished.
#[derive(Debug, Default)]
pub struct ValidatorMetrics {
    /// Objects checked by the traversal
    objects_checked: AtomicU64,
    /// Fields visited, at any depth
    fields_visited: AtomicU64,
    /// Diagnostics emitted before deduplication
    diagnostics_emitted: AtomicU64,
    /// Main-thread jobs queued by the traversal
    main_jobs_queued: AtomicU64,
    /// Parallel jobs queued by the traversal
    parallel_jobs_queued: AtomicU64,
    /// Uniqueness observations recorded
    unique_observations: AtomicU64,
    /// Duplicate groups reported
    duplicates_found: AtomicU64,
    /// Panics caught by the job controller
    job_failures: AtomicU64,
}

impl ValidatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_objects_checked(&self) {
        self.objects_checked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fields_visited(&self) {
        self.fields_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_diagnostics(&self) {
        self.diagnostics_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_diagnostics(&self, count: u64) {
        self.diagnostics_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_main_jobs(&self) {
        self.main_jobs_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_parallel_jobs(&self) {
        self.parallel_jobs_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unique_observations(&self) {
        self.unique_observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_duplicates(&self, count: u64) {
        self.duplicates_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_job_failures(&self, count: u64) {
        self.job_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn objects_checked(&self) -> u64 {
        self.objects_checked.load(Ordering::Relaxed)
    }

    pub fn fields_visited(&self) -> u64 {
        self.fields_visited.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_checked: self.objects_checked.load(Ordering::Relaxed),
            fields_visited: self.fields_visited.load(Ordering::Relaxed),
            diagnostics_emitted: self.diagnostics_emitted.load(Ordering::Relaxed),
            main_jobs_queued: self.main_jobs_queued.load(Ordering::Relaxed),
            parallel_jobs_queued: self.parallel_jobs_queued.load(Ordering::Relaxed),
            unique_observations: self.unique_observations.load(Ordering::Relaxed),
            duplicates_found: self.duplicates_found.load(Ordering::Relaxed),
            job_failures: self.job_failures.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub objects_checked: u64,
    pub fields_visited: u64,
    pub diagnostics_emitted: u64,
    pub main_jobs_queued: u64,
    pub parallel_jobs_queued: u64,
    pub unique_observations: u64,
    pub duplicates_found: u64,
    pub job_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let metrics = ValidatorMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = ValidatorMetrics::new();
        metrics.increment_objects_checked();
        metrics.increment_fields_visited();
        metrics.increment_fields_visited();
        metrics.add_diagnostics(3);
        metrics.increment_diagnostics();
        metrics.add_duplicates(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.objects_checked, 1);
        assert_eq!(snapshot.fields_visited, 2);
        assert_eq!(snapshot.diagnostics_emitted, 4);
        assert_eq!(snapshot.duplicates_found, 2);
    }

    #[test]
    fn test_to_json() {
        let metrics = ValidatorMetrics::new();
        metrics.increment_main_jobs();

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["main_jobs_queued"], 1);
        assert_eq!(parsed["job_failures"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(ValidatorMetrics::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.increment_fields_visited();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.fields_visited(), 1000);
    }
}
