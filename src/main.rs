//! objval CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Exit codes:
//! 0 when clean, 1 when diagnostics were found, 2 on failure.

use objval::cli;

fn main() {
    match cli::run() {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}
