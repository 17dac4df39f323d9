//! Error types for name and ID parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating names and IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("ID cannot be empty")]
    Empty,

    /// The ID has an invalid prefix.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ID is missing the underscore separator.
    #[error("ID missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of the ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),

    /// The name is longer than a DNS label allows.
    #[error("{kind} '{name}' is longer than {max} characters")]
    NameTooLong {
        kind: &'static str,
        name: String,
        max: usize,
    },

    /// The name contains characters outside `[a-z0-9-]` or is badly delimited.
    #[error("invalid {kind} '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error came from name validation.
    pub fn is_name_error(&self) -> bool {
        matches!(
            self,
            IdError::NameTooLong { .. } | IdError::InvalidName { .. }
        )
    }
}
