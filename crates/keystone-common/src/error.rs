//! Error types for KeystoneDB.
//!
//! Provides the unified error type used across all components, together
//! with stable numeric error codes for programmatic handling.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes are surfaced to callers as the `errorNum` field of a
/// failure response and are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidSpecification = 0x0002,

    // Collection errors (0x0100 - 0x01FF)
    /// Collection not found.
    CollectionNotFound = 0x0100,
    /// Collection name is invalid.
    InvalidCollectionName = 0x0101,
    /// Collection already exists.
    DuplicateCollection = 0x0102,
    /// Collection has reached its document limit.
    CollectionFull = 0x0103,

    // Transaction errors (0x0200 - 0x02FF)
    /// Lock acquisition timed out.
    LockTimeout = 0x0200,
    /// Write attempted through a read-mode handle.
    CollectionReadOnly = 0x0201,
    /// Collection was not declared by the transaction.
    UnknownCollectionHandle = 0x0202,
    /// Caller-supplied action failed.
    ActionFailed = 0x0203,
    /// Transaction context was already committed or rolled back.
    TransactionFinished = 0x0204,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Collection",
            0x02 => "Transaction",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for KeystoneDB.
///
/// # Example
///
/// ```rust
/// use keystone_common::error::{KeystoneError, KeystoneResult};
///
/// fn find_collection(name: &str) -> KeystoneResult<()> {
///     Err(KeystoneError::CollectionNotFound {
///         reference: name.to_string(),
///     })
/// }
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeystoneError {
    /// Internal error - this indicates a bug or an engine fault.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// The transaction specification is missing or malformed.
    #[error("invalid transaction specification: {message}")]
    InvalidSpecification {
        /// What was wrong with the specification.
        message: String,
    },

    /// Collection not found.
    #[error("collection '{reference}' not found")]
    CollectionNotFound {
        /// The reference that failed to resolve.
        reference: String,
    },

    /// Collection name is invalid.
    #[error("invalid collection name '{name}'")]
    InvalidCollectionName {
        /// The rejected name.
        name: String,
    },

    /// A collection with this name already exists.
    #[error("collection '{name}' already exists")]
    DuplicateCollection {
        /// The conflicting name.
        name: String,
    },

    /// A collection has reached its document limit.
    #[error("collection '{collection}' is full (limit {limit})")]
    CollectionFull {
        /// The full collection.
        collection: String,
        /// The configured document limit.
        limit: usize,
    },

    /// Lock acquisition timed out.
    #[error("timed out waiting for lock on collection '{collection}' after {waited_ms}ms")]
    LockTimeout {
        /// The contended collection.
        collection: String,
        /// How long the transaction waited.
        waited_ms: u64,
    },

    /// Write attempted on a collection declared only for reading.
    #[error("collection '{collection}' is read-only in this transaction")]
    CollectionReadOnly {
        /// The collection the action tried to write.
        collection: String,
    },

    /// The action referenced a collection outside its declared sets.
    #[error("collection '{collection}' is not part of this transaction")]
    UnknownCollectionHandle {
        /// The undeclared collection.
        collection: String,
    },

    /// The caller-supplied action failed.
    #[error("action failed: {message}")]
    ActionFailed {
        /// Failure detail reported by the action.
        message: String,
    },

    /// Commit or rollback was attempted on a finished context.
    #[error("transaction context already finished")]
    TransactionFinished,
}

impl KeystoneError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidSpecification { .. } => ErrorCode::InvalidSpecification,
            Self::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            Self::InvalidCollectionName { .. } => ErrorCode::InvalidCollectionName,
            Self::DuplicateCollection { .. } => ErrorCode::DuplicateCollection,
            Self::CollectionFull { .. } => ErrorCode::CollectionFull,
            Self::LockTimeout { .. } => ErrorCode::LockTimeout,
            Self::CollectionReadOnly { .. } => ErrorCode::CollectionReadOnly,
            Self::UnknownCollectionHandle { .. } => ErrorCode::UnknownCollectionHandle,
            Self::ActionFailed { .. } => ErrorCode::ActionFailed,
            Self::TransactionFinished => ErrorCode::TransactionFinished,
        }
    }

    /// Returns true if the caller may retry the operation.
    ///
    /// Only lock timeouts are transient; the coordinator itself never
    /// auto-retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid-specification error.
    #[must_use]
    pub fn invalid_specification(message: impl Into<String>) -> Self {
        Self::InvalidSpecification {
            message: message.into(),
        }
    }

    /// Creates an action-failed error.
    #[must_use]
    pub fn action_failed(message: impl Into<String>) -> Self {
        Self::ActionFailed {
            message: message.into(),
        }
    }
}

/// Result type for KeystoneDB operations.
pub type KeystoneResult<T> = Result<T, KeystoneError>;
