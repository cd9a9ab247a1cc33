//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Per-run counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: nothing here changes what a run reports.
//!
//! ```ignore
//! use objval::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::SnapshotLoaded, &[("objects", "42")]);
//!
//! let scope = ObservationScope::new("VALIDATION");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, ValidatorMetrics};
pub use scope::{ObservationScope, Timer};

/// Default severity of a lifecycle event
pub fn severity_for(event: Event) -> Severity {
    match event {
        e if e.is_fatal() => Severity::Fatal,
        Event::WorkerFailed => Severity::Error,
        Event::RunCancelled | Event::DiagnosticReported => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_severities() {
        assert_eq!(severity_for(Event::JobFailures), Severity::Fatal);
        assert_eq!(severity_for(Event::WorkerFailed), Severity::Error);
        assert_eq!(severity_for(Event::RunCancelled), Severity::Warn);
        assert_eq!(severity_for(Event::RunStart), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::RunStart);
        log_event_with_fields(Event::ConfigLoaded, &[("path", "/tmp/objval.json")]);
    }
}
