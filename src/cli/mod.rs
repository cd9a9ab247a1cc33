//! CLI module for objval
//!
//! Provides command-line interface for:
//! - check: Load a snapshot, validate it and print the report
//! - config: Print the default configuration

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, OutputFormat};
pub use commands::{check, run, run_command, Outcome};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_report_json, write_report_text};
