//! CLI argument definitions using clap
//!
//! Commands:
//! - objval check --snapshot <path> [--config <path>] [--format text|json] [--quiet]
//! - objval config

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// objval - batch validation of host object graphs
#[derive(Parser, Debug)]
#[command(name = "objval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate every object of a snapshot
    Check {
        /// Path to the JSON snapshot
        #[arg(long)]
        snapshot: PathBuf,

        /// Path to a validator configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format for the report
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also check everything the roots reference
        #[arg(long)]
        recursive: bool,

        /// Only log warnings and errors, and hide progress
        #[arg(long)]
        quiet: bool,
    },

    /// Print the default configuration
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "objval",
            "check",
            "--snapshot",
            "scene.json",
            "--format",
            "json",
            "--quiet",
        ])
        .unwrap();
        match cli.command {
            Command::Check {
                snapshot,
                config,
                format,
                recursive,
                quiet,
            } => {
                assert_eq!(snapshot, PathBuf::from("scene.json"));
                assert!(config.is_none());
                assert_eq!(format, OutputFormat::Json);
                assert!(!recursive);
                assert!(quiet);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_is_required() {
        assert!(Cli::try_parse_from(["objval", "check"]).is_err());
    }
}
