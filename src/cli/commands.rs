//! CLI command implementations

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::snapshot::Snapshot;
use crate::validator::{throttled, OnProgress, ValidationReport, Validator, ValidatorConfig};

use super::args::{Command, OutputFormat};
use super::errors::{CliError, CliResult};
use super::io::{write_progress, write_report_json, write_report_text};

/// What a successful command found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    DiagnosticsFound,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Clean => 0,
            Outcome::DiagnosticsFound => 1,
        }
    }
}

/// Main CLI entry point. The only function main.rs calls.
pub fn run() -> CliResult<Outcome> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<Outcome> {
    match cmd {
        Command::Check {
            snapshot,
            config,
            format,
            recursive,
            quiet,
        } => {
            if quiet {
                Logger::set_min_severity(Severity::Warn);
            }
            let report = check(&snapshot, config.as_deref(), recursive, !quiet)?;
            let mut stdout = io::stdout().lock();
            match format {
                OutputFormat::Text => write_report_text(&mut stdout, &report)?,
                OutputFormat::Json => write_report_json(&mut stdout, &report)?,
            }
            Ok(outcome(&report))
        }
        Command::Config => {
            print_default_config()?;
            Ok(Outcome::Clean)
        }
    }
}

/// Loads a snapshot and validates it.
pub fn check(
    snapshot_path: &Path,
    config_path: Option<&Path>,
    recursive: bool,
    show_progress: bool,
) -> CliResult<ValidationReport> {
    let config = load_config(config_path)?;
    let interval = Duration::from_millis(config.progress_interval_ms);
    let snapshot = Snapshot::load(snapshot_path)?;
    let validator = Validator::new(snapshot.registry.clone()).with_config(config);

    let mut progress = throttled(interval, |p| {
        write_progress(p);
        false
    });
    let callback: Option<OnProgress<'_>> = if show_progress { Some(&mut *progress) } else { None };

    let report = if recursive {
        validator.check_recursively(&snapshot.host, &snapshot.context, &snapshot.roots, callback)?
    } else {
        validator.check(&snapshot.host, &snapshot.context, &snapshot.roots, callback)?
    };
    Ok(report)
}

fn load_config(path: Option<&Path>) -> CliResult<ValidatorConfig> {
    match path {
        Some(path) => {
            let config = ValidatorConfig::load(path)?;
            log_event_with_fields(
                Event::ConfigLoaded,
                &[("path", path.display().to_string().as_str())],
            );
            Ok(config)
        }
        None => Ok(ValidatorConfig::default()),
    }
}

fn print_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&ValidatorConfig::default())
        .map_err(|e| CliError::config_error(format!("Failed to render config: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn outcome(report: &ValidationReport) -> Outcome {
    if report.is_clean() {
        Outcome::Clean
    } else {
        Outcome::DiagnosticsFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_snapshot(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("scene.json");
        let snapshot = json!({
            "context": "Scene: test",
            "types": [{ "name": "Door", "kind": "host_object",
                        "fields": [{ "name": "key", "type": "string",
                                     "attributes": [{ "type": "non_empty" }] }] }],
            "objects": [
                { "id": "d1", "type": "Door", "fields": { "key": "" } },
                { "id": "d2", "type": "Door", "fields": { "key": "gold" } }
            ]
        });
        std::fs::write(&path, snapshot.to_string()).unwrap();
        path
    }

    #[test]
    fn test_check_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(dir.path());
        let report = check(&path, None, false, false).unwrap();
        assert_eq!(report.objects_checked, 2);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(outcome(&report), Outcome::DiagnosticsFound);
        assert_eq!(outcome(&report).exit_code(), 1);
    }

    #[test]
    fn test_check_with_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(dir.path());
        let config_path = dir.path().join("objval.json");
        std::fs::write(&config_path, r#"{ "checks": "TAGS" }"#).unwrap();

        let report = check(&path, Some(&config_path), false, false).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_bad_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(dir.path());
        let config_path = dir.path().join("objval.json");
        std::fs::write(&config_path, r#"{ "batch_size": 0 }"#).unwrap();

        let err = check(&path, Some(&config_path), false, false).unwrap_err();
        assert_eq!(err.code_str(), "OBJVAL_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&dir.path().join("none.json"), None, false, false).unwrap_err();
        assert_eq!(err.code_str(), "OBJVAL_CLI_SNAPSHOT_ERROR");
    }
}
