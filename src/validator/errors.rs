//! Fatal validator errors
//!
//! Problems in the checked data are never errors here: they become
//! diagnostics. A `ValidatorError` means the run itself could not produce a
//! trustworthy result.

use std::fmt;

use thiserror::Error;

use crate::schema::SchemaError;

/// A job that panicked instead of completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// "main" or "parallel"
    pub queue: &'static str,
    pub message: String,
}

impl JobFailure {
    pub fn new(queue: &'static str, message: impl Into<String>) -> Self {
        Self {
            queue,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} job failed: {}", self.queue, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Job controller had {total} exceptions, returning max {}!", .failures.len())]
    JobFailures {
        total: usize,
        dropped: usize,
        failures: Vec<JobFailure>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Failed to start validator thread pool: {0}")]
    ThreadPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    /// Builds the aggregate failure, keeping at most `limit` inner failures.
    pub fn job_failures(mut failures: Vec<JobFailure>, limit: usize) -> Self {
        let total = failures.len();
        failures.truncate(limit);
        Self::JobFailures {
            total,
            dropped: total - failures.len(),
            failures,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::JobFailures { .. } => "OBJVAL_JOB_FAILURES",
            Self::Config(_) => "OBJVAL_CONFIG_ERROR",
            Self::Schema(_) => "OBJVAL_SCHEMA_ERROR",
            Self::Snapshot(_) => "OBJVAL_SNAPSHOT_ERROR",
            Self::ThreadPool(_) => "OBJVAL_THREAD_POOL",
            Self::Io(_) => "OBJVAL_IO_ERROR",
        }
    }
}

/// Result type for validator operations
pub type ValidatorResult<T> = Result<T, ValidatorError>;
