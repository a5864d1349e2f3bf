//! Primary error type for the Vellum storage read path.
//!
//! Structured variants for the conditions the iterator can produce or
//! propagate, plus classification helpers so callers can decide between
//! retrying, surfacing, and giving up. Transaction ids are carried as raw
//! `u64` to keep this crate dependency-free.

use thiserror::Error;

/// Errors produced or propagated by the storage read path.
#[derive(Error, Debug)]
pub enum VellumError {
    /// Undecodable key or value bytes.
    #[error("corruption: {detail}")]
    Corruption { detail: String },

    /// A decoded value does not fit the column's declared type.
    #[error("type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// A provisional write whose transaction status cannot be decided yet.
    ///
    /// The read should be retried once the transaction resolves.
    #[error("transaction {txn_id} unresolved at read time, retry")]
    TryAgain { txn_id: u64 },

    /// Cancellation token triggered or deadline exceeded.
    #[error("operation cancelled: {reason}")]
    Cancelled { reason: &'static str },

    /// I/O error propagated from the underlying store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The iterator was drained and asked for another row.
    #[error("iterator exhausted")]
    Exhausted,
}

/// Coarse classification of a [`VellumError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Undecodable or inconsistent data; fatal for the iterator.
    Corruption,
    /// Retryable by the caller at a later time.
    Transient,
    /// Cancellation or deadline; terminal for this operation.
    Cancelled,
    /// Store-level I/O failure; terminal.
    Io,
    /// Caller misuse; recoverable at the API level.
    Usage,
}

impl VellumError {
    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Corruption { .. } | Self::TypeMismatch { .. } => ErrorClass::Corruption,
            Self::TryAgain { .. } => ErrorClass::Transient,
            Self::Cancelled { .. } => ErrorClass::Cancelled,
            Self::Io(_) => ErrorClass::Io,
            Self::Exhausted => ErrorClass::Usage,
        }
    }

    /// Whether the same call may succeed if retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient)
    }

    /// Human-friendly suggestion for handling this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::TryAgain { .. } => {
                Some("Retry the read after the transaction commits or aborts")
            }
            Self::Corruption { .. } | Self::TypeMismatch { .. } => {
                Some("The stored data is inconsistent; do not retry")
            }
            Self::Exhausted => Some("Check has_next() before requesting another row"),
            _ => None,
        }
    }

    /// Create a corruption error.
    pub fn corruption(detail: impl Into<String>) -> Self {
        Self::Corruption {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `VellumError`.
pub type Result<T> = std::result::Result<T, VellumError>;
