//! Schema error types
//!
//! Error codes:
//! - OBJVAL_UNKNOWN_TYPE
//! - OBJVAL_TYPE_IMMUTABLE
//! - OBJVAL_MALFORMED_TYPE
//! - OBJVAL_UNKNOWN_LIST_ELEMENT

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Type name not registered
    ObjvalUnknownType,
    /// Attempt to register a type name twice
    ObjvalTypeImmutable,
    /// Descriptor is internally inconsistent
    ObjvalMalformedType,
    /// List element type cannot be determined
    ObjvalUnknownListElement,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::ObjvalUnknownType => "OBJVAL_UNKNOWN_TYPE",
            SchemaErrorCode::ObjvalTypeImmutable => "OBJVAL_TYPE_IMMUTABLE",
            SchemaErrorCode::ObjvalMalformedType => "OBJVAL_MALFORMED_TYPE",
            SchemaErrorCode::ObjvalUnknownListElement => "OBJVAL_UNKNOWN_LIST_ELEMENT",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    type_name: Option<String>,
}

impl SchemaError {
    /// Create an unknown type error
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        let name = type_name.into();
        Self {
            code: SchemaErrorCode::ObjvalUnknownType,
            message: format!("Type '{}' is not registered", name),
            type_name: Some(name),
        }
    }

    /// Create a type immutable error
    pub fn type_immutable(type_name: impl Into<String>) -> Self {
        let name = type_name.into();
        Self {
            code: SchemaErrorCode::ObjvalTypeImmutable,
            message: format!("Type '{}' is already registered and cannot be changed", name),
            type_name: Some(name),
        }
    }

    /// Create a malformed type error
    pub fn malformed_type(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = type_name.into();
        Self {
            code: SchemaErrorCode::ObjvalMalformedType,
            message: format!("Malformed type '{}': {}", name, reason.into()),
            type_name: Some(name),
        }
    }

    /// Create an unknown list element error
    pub fn unknown_list_element(detail: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::ObjvalUnknownListElement,
            message: format!("Could not determine list element type: {}", detail.into()),
            type_name: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending type name if applicable
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
