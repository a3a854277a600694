//! System-wide constants for KeystoneDB.
//!
//! This module defines limits and defaults used across the database.

// =============================================================================
// Collection Limits
// =============================================================================

/// Maximum length of a collection name in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 256;

/// Maximum length of a document key in bytes.
pub const MAX_DOCUMENT_KEY_LEN: usize = 4 * 1024;

/// Default maximum number of documents a collection may hold.
///
/// Commits that would push a collection past this limit fail as an
/// internal storage fault and the transaction rolls back.
pub const DEFAULT_MAX_DOCUMENTS: usize = 1_000_000;

// =============================================================================
// Transaction Constants
// =============================================================================

/// Lock acquisition timeout (default).
///
/// Used when a transaction does not specify its own `lockTimeout`.
/// A timeout of zero means wait indefinitely.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000; // 10 seconds

/// Interval between lock acquisition retries while waiting.
pub const LOCK_RETRY_INTERVAL_MICROS: u64 = 100;
