//! Error types for schema configuration and validation
//!
//! Configuration mistakes (an unknown strictness mode) are hard failures
//! raised at configuration time. Data problems are never raised: they are
//! appended to an error sink and the whole candidate keeps validating, so
//! one pass reports every problem at once.

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Configuration errors. These are programmer mistakes and fail
/// immediately, never deferred to validation time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Unrecognized strictness mode string
    #[error("unknown strictness '{0}', expected one of: strict, relaxed, loose")]
    InvalidStrictness(String),
}

/// Result type for schema configuration operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Reason tag for a single validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// The top-level candidate itself was absent
    #[error("no input to validate")]
    MissingInput,
    /// Undeclared key under strict mode
    #[error("field not in definition")]
    NotInDefinition,
    /// Required field absent after normalization
    #[error("does not exist")]
    Missing,
    /// Value failed the membership check
    #[error("value wasn't in array")]
    NotInSet,
    /// Runtime type tag mismatch
    #[error("wrong type")]
    WrongType,
    /// Identity check mismatch
    #[error("incorrect instance type")]
    WrongInstance,
    /// String value did not match the declared pattern
    #[error("value does not match regex")]
    RegexMismatch,
}

/// A single validation failure record.
///
/// Failures inside a nested sub-schema are relabeled as they bubble out:
/// `field` becomes the parent key and `sub_field` carries the dotted path
/// of the inner field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Field the error is reported under
    pub field: String,
    /// Reason tag
    pub kind: ErrorKind,
    /// Dotted path of the originating field inside a nested sub-schema
    pub sub_field: Option<String>,
    /// Offending value, echoed for diagnostics where useful
    pub value: Option<Value>,
    /// Pattern source for regex mismatches
    pub pattern: Option<String>,
}

impl ValidationError {
    /// Creates an error record for `field`.
    pub fn new(field: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
            sub_field: None,
            value: None,
            pattern: None,
        }
    }

    /// Creates a regex mismatch record echoing the value and the pattern.
    pub fn regex_mismatch(
        field: impl Into<String>,
        value: Option<Value>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::RegexMismatch,
            sub_field: None,
            value,
            pattern: Some(pattern.into()),
        }
    }

    /// Relabels a nested error under `parent`.
    ///
    /// The inner field moves into `sub_field`; repeated relabeling through
    /// deeper nesting accumulates a dotted trail.
    pub(crate) fn relabel(mut self, parent: &str) -> Self {
        self.sub_field = Some(match self.sub_field.take() {
            Some(inner) => format!("{}.{}", self.field, inner),
            None => std::mem::take(&mut self.field),
        });
        self.field = parent.to_string();
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}'", self.field)?;
        if let Some(sub) = &self.sub_field {
            write!(f, ", sub field '{}'", sub)?;
        }
        write!(f, ": {}", self.kind)?;
        if let Some(pattern) = &self.pattern {
            write!(f, " (regex '{}')", pattern)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
