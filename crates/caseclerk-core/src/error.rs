//! # Core Errors
//!
//! Every fallible operation in `caseclerk-core` returns [`CoreError`].
//! The HTTP layer maps each variant onto a status code; the variants are
//! therefore coarse and carry a human readable message.

use thiserror::Error;

/// Result alias used across the crate.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A record with the given id does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A unique field already holds this value.
    #[error("{kind} with {field} '{value}' already exists")]
    Duplicate {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    /// Input failed a field rule.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The record exists but the operation is not allowed in its current state.
    #[error("{0}")]
    InvalidState(String),

    /// Snapshot bytes are not in a format we understand.
    #[error("unsupported snapshot format: {0}")]
    Format(String),

    /// Encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Password hashing failed.
    #[error("credential error: {0}")]
    Credentials(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Wraps a redb failure. redb has a separate error type per operation, so
    /// there is no `From` impl for it.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn duplicate(kind: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            field,
            value: value.into(),
        }
    }
}

impl From<postcard::Error> for CoreError {
    fn from(err: postcard::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
