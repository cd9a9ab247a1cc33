//! Progress reporting
//!
//! A progress callback returns `true` to ask the run to stop starting new
//! work. [`throttled`] rate-limits a callback; the last reported state is
//! always delivered.

use std::fmt;
use std::time::{Duration, Instant};

/// Snapshot handed to a progress callback.
pub struct Progress<'a> {
    pub current: usize,
    pub total: usize,
    text: &'a dyn Fn() -> String,
}

impl<'a> Progress<'a> {
    pub fn new(current: usize, total: usize, text: &'a dyn Fn() -> String) -> Self {
        Self {
            current,
            total,
            text,
        }
    }

    /// Fraction done, in `[0, 1]`. An empty run counts as done.
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.current as f32 / self.total as f32).min(1.0)
        }
    }

    /// `"<status> (<current> / <total>)"`. The status text is computed here,
    /// not when the snapshot is made.
    pub fn text(&self) -> String {
        format!("{} ({} / {})", (self.text)(), self.current, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

impl fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("current", &self.current)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

pub type ProgressCallback<'a> = Box<dyn FnMut(&Progress<'_>) -> bool + 'a>;

/// Calls `callback` at most once per `interval`. A completed progress is
/// forwarded early once per distinct `(current, total)`, so an idle polling
/// loop repeating the same count stays throttled. Skipped calls return `false`.
pub fn throttled<'a, F>(interval: Duration, mut callback: F) -> ProgressCallback<'a>
where
    F: FnMut(&Progress<'_>) -> bool + 'a,
{
    let mut last: Option<Instant> = None;
    let mut last_complete: Option<(usize, usize)> = None;
    Box::new(move |progress| {
        let now = Instant::now();
        let due = match last {
            None => true,
            Some(at) => now.duration_since(at) >= interval,
        };
        let counts = (progress.current, progress.total);
        let newly_complete = progress.is_complete() && last_complete != Some(counts);
        if due || newly_complete {
            last = Some(now);
            if progress.is_complete() {
                last_complete = Some(counts);
            }
            callback(progress)
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_ratio() {
        let status = || "Checking".to_string();
        let progress = Progress::new(3, 12, &status);
        assert_eq!(progress.text(), "Checking (3 / 12)");
        assert!((progress.ratio() - 0.25).abs() < f32::EPSILON);
        assert!(!progress.is_complete());

        let empty = Progress::new(0, 0, &status);
        assert_eq!(empty.ratio(), 1.0);
        assert!(empty.is_complete());
    }

    #[test]
    fn test_throttled_skips_rapid_calls() {
        let mut seen = Vec::new();
        {
            let mut callback = throttled(Duration::from_secs(3600), |p: &Progress<'_>| {
                seen.push(p.current);
                false
            });
            let status = String::new;
            for i in 0..10 {
                callback(&Progress::new(i, 10, &status));
            }
            callback(&Progress::new(10, 10, &status));
        }
        assert_eq!(seen, vec![0, 10]);
    }

    #[test]
    fn test_throttled_forwards_repeated_completion_once() {
        let mut seen = Vec::new();
        {
            let mut callback = throttled(Duration::from_secs(3600), |p: &Progress<'_>| {
                seen.push((p.current, p.total));
                false
            });
            let status = String::new;
            callback(&Progress::new(4, 4, &status));
            for _ in 0..100 {
                callback(&Progress::new(4, 4, &status));
            }
            callback(&Progress::new(5, 6, &status));
            callback(&Progress::new(6, 6, &status));
            callback(&Progress::new(6, 6, &status));
        }
        assert_eq!(seen, vec![(4, 4), (6, 6)]);
    }

    #[test]
    fn test_throttled_forwards_cancel() {
        let mut callback = throttled(Duration::ZERO, |_: &Progress<'_>| true);
        let status = String::new;
        assert!(callback(&Progress::new(1, 2, &status)));
    }
}
