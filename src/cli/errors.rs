//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 2.

use std::fmt;
use std::io;

use crate::snapshot::SnapshotError;
use crate::validator::ValidatorError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout/stderr)
    IoError,
    /// Snapshot could not be loaded
    SnapshotError,
    /// The run itself failed
    ValidationFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "OBJVAL_CLI_CONFIG_ERROR",
            Self::IoError => "OBJVAL_CLI_IO_ERROR",
            Self::SnapshotError => "OBJVAL_CLI_SNAPSHOT_ERROR",
            Self::ValidationFailed => "OBJVAL_CLI_VALIDATION_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn snapshot_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::SnapshotError, msg)
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ValidationFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<SnapshotError> for CliError {
    fn from(e: SnapshotError) -> Self {
        Self::snapshot_error(e.to_string())
    }
}

impl From<ValidatorError> for CliError {
    fn from(e: ValidatorError) -> Self {
        match e {
            ValidatorError::Config(_) => Self::config_error(e.to_string()),
            other => Self::validation_failed(format!("{}: {}", other.code(), other)),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
