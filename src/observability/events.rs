//! Lifecycle events of a validation run
//!
//! Events are explicit and typed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded
    ConfigLoaded,
    /// Snapshot file parsed into a host and type registry
    SnapshotLoaded,
    /// A run begins
    RunStart,
    /// A run finished and produced a report
    RunComplete,
    /// The progress callback asked the run to stop
    RunCancelled,
    /// The traversal worker thread panicked
    WorkerFailed,
    /// Jobs panicked outside every per-job boundary (FATAL)
    JobFailures,
    /// Duplicate unique values were reported
    DuplicatesFound,
    /// One diagnostic rendered through the logger
    DiagnosticReported,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SnapshotLoaded => "SNAPSHOT_LOADED",
            Event::RunStart => "VALIDATION_RUN_BEGIN",
            Event::RunComplete => "VALIDATION_RUN_COMPLETE",
            Event::RunCancelled => "VALIDATION_RUN_CANCELLED",
            Event::WorkerFailed => "VALIDATION_WORKER_FAILED",
            Event::JobFailures => "VALIDATION_JOB_FAILURES",
            Event::DuplicatesFound => "DUPLICATE_VALUES_FOUND",
            Event::DiagnosticReported => "DIAGNOSTIC",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::JobFailures)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
