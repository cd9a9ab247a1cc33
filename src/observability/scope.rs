//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` on drop otherwise

use std::cell::Cell;
use std::time::{Duration, Instant};

use super::logger::Logger;

/// A scope that logs its own start and end
///
/// ```ignore
/// let scope = ObservationScope::with_fields("VALIDATION", &[("run_id", id)]);
/// // ... do work ...
/// scope.complete_with_fields(&[("diagnostics", "3")]);
/// ```
///
/// Fields given at creation are repeated on every closing line, together with
/// the elapsed time.
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    timer: Timer,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            timer: Timer::new(),
        }
    }

    fn closing_fields<'f>(&'f self, elapsed: &'f str, extra: &[(&'f str, &'f str)]) -> Vec<(&'f str, &'f str)> {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.push(("elapsed_ms", elapsed));
        all.extend(extra.iter().copied());
        all
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.timer.elapsed_ms();
        Logger::info(
            &format!("{}_COMPLETE", self.name),
            &self.closing_fields(&elapsed, extra_fields),
        );
    }

    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let elapsed = self.timer.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &self.closing_fields(&elapsed, &[("reason", reason)]),
        );
    }

    /// Logs `{name}_FAILED` at FATAL level.
    pub fn fail_fatal(self, reason: &str) {
        self.completed.set(true);
        let elapsed = self.timer.elapsed_ms();
        Logger::fatal(
            &format!("{}_FAILED", self.name),
            &self.closing_fields(&elapsed, &[("reason", reason)]),
        );
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed milliseconds as a string, for log fields
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::with_fields("TEST", &[("run_id", "abc")]);
        assert!(!scope.is_completed());
        scope.complete_with_fields(&[("diagnostics", "0")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("TEST");
        scope.fail("something went wrong");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(Duration::from_millis(10));
        let ms: u64 = timer.elapsed_ms().parse().unwrap();
        assert!(ms >= 10);
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }
}
