//! Option validation errors with field-level reporting

use std::fmt;
use thiserror::Error;

/// Validation error naming the offending field and the violated constraint
#[derive(Debug, Error)]
pub struct ValidationError {
    /// Name of the field that failed validation (e.g., "max_tokens")
    pub field: String,
    /// The validation error kind
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed at '{}': {}", self.field, self.kind)
    }
}

/// Specific validation error types
#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("value out of range: {message}")]
    OutOfRange { message: String },

    #[error("invalid value: expected {expected}, got {actual}")]
    InvalidValue { expected: String, actual: String },

    #[error("incompatible options: {message}")]
    Incompatible { message: String },
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// Helper to create an out of range error
    pub fn out_of_range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }

    /// Helper to create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(
            field,
            ValidationErrorKind::InvalidValue {
                expected: expected.into(),
                actual: actual.into(),
            },
        )
    }

    /// Helper to create an incompatible options error
    pub fn incompatible(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field,
            ValidationErrorKind::Incompatible {
                message: message.into(),
            },
        )
    }
}
