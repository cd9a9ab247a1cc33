//! Snapshot error types
//!
//! Error codes:
//! - OBJVAL_SNAPSHOT_IO
//! - OBJVAL_SNAPSHOT_PARSE
//! - OBJVAL_SNAPSHOT_INVALID
//! - OBJVAL_SNAPSHOT_SCHEMA

use std::fmt;
use std::io;

use crate::schema::SchemaError;

/// Snapshot-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotErrorCode {
    /// Snapshot file could not be read
    ObjvalSnapshotIo,
    /// Snapshot file is not valid JSON or misses required keys
    ObjvalSnapshotParse,
    /// A value does not fit its declared type, or a reference is dangling
    ObjvalSnapshotInvalid,
    /// Type declarations were rejected by the registry
    ObjvalSnapshotSchema,
}

impl SnapshotErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            SnapshotErrorCode::ObjvalSnapshotIo => "OBJVAL_SNAPSHOT_IO",
            SnapshotErrorCode::ObjvalSnapshotParse => "OBJVAL_SNAPSHOT_PARSE",
            SnapshotErrorCode::ObjvalSnapshotInvalid => "OBJVAL_SNAPSHOT_INVALID",
            SnapshotErrorCode::ObjvalSnapshotSchema => "OBJVAL_SNAPSHOT_SCHEMA",
        }
    }
}

impl fmt::Display for SnapshotErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug)]
pub struct SnapshotError {
    code: SnapshotErrorCode,
    message: String,
    /// Where in the snapshot the problem is, e.g. `objects[p1].weapon`
    location: Option<String>,
    source: Option<io::Error>,
}

impl SnapshotError {
    pub fn io_error(path: &std::path::Path, source: io::Error) -> Self {
        Self {
            code: SnapshotErrorCode::ObjvalSnapshotIo,
            message: format!("Failed to read snapshot at {}", path.display()),
            location: None,
            source: Some(source),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::ObjvalSnapshotParse,
            message: message.into(),
            location: None,
            source: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: SnapshotErrorCode::ObjvalSnapshotInvalid,
            message: message.into(),
            location: None,
            source: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn code(&self) -> SnapshotErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl From<SchemaError> for SnapshotError {
    fn from(err: SchemaError) -> Self {
        Self {
            code: SnapshotErrorCode::ObjvalSnapshotSchema,
            message: err.to_string(),
            location: None,
            source: None,
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)?;
        if let Some(ref location) = self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
