//! Report output
//!
//! Reports go to stdout; progress goes to stderr so piping a JSON report
//! stays clean.

use std::io::{self, Write};

use crate::validator::{DiagnosticKind, Progress, ValidationReport};

use super::errors::CliResult;

/// Writes the report as pretty JSON.
pub fn write_report_json(out: &mut impl Write, report: &ValidationReport) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Writes one line per diagnostic followed by a per-kind summary.
pub fn write_report_text(out: &mut impl Write, report: &ValidationReport) -> CliResult<()> {
    for diagnostic in &report.diagnostics {
        writeln!(out, "{}", diagnostic)?;
    }

    let mut counts: Vec<(DiagnosticKind, usize)> = Vec::new();
    for diagnostic in &report.diagnostics {
        match counts.iter_mut().find(|(kind, _)| *kind == diagnostic.kind) {
            Some((_, count)) => *count += 1,
            None => counts.push((diagnostic.kind, 1)),
        }
    }
    counts.sort();

    if !report.diagnostics.is_empty() {
        writeln!(out)?;
    }
    for (kind, count) in &counts {
        writeln!(out, "  {:<28} {}", kind.as_str(), count)?;
    }
    writeln!(
        out,
        "{}: {} objects, {} diagnostics in {} ms{}",
        report.context,
        report.objects_checked,
        report.diagnostics.len(),
        report.elapsed_ms,
        if report.cancelled { " (cancelled)" } else { "" },
    )?;
    out.flush()?;
    Ok(())
}

/// Rewrites the current stderr line with the progress text.
pub fn write_progress(progress: &Progress<'_>) {
    let mut err = io::stderr();
    let _ = write!(err, "\r{:>5.1}% {}", progress.ratio() * 100.0, progress.text());
    if progress.is_complete() {
        let _ = writeln!(err);
    }
    let _ = err.flush();
}
