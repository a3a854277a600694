//! Response mapping.
//!
//! Maps a transaction [`Outcome`] onto the wire response shape:
//!
//! ```json
//! { "error": false, "code": 200, "result": ... }
//! { "error": true, "code": 404, "errorNum": 256, "errorMessage": "..." }
//! ```
//!
//! The mapping is pure and total: every outcome maps to exactly one
//! response, and mapping the same outcome twice yields the same
//! response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use keystone_common::error::KeystoneError;
use keystone_txn::Outcome;

/// HTTP-style status for a successful transaction.
pub const STATUS_OK: u16 = 200;
/// HTTP-style status for a malformed request.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// HTTP-style status for an unresolvable collection reference.
pub const STATUS_NOT_FOUND: u16 = 404;
/// HTTP-style status for lock contention.
pub const STATUS_CONFLICT: u16 = 409;
/// HTTP-style status for action failures and engine faults.
pub const STATUS_INTERNAL: u16 = 500;

/// The transport-agnostic response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    /// The transaction committed.
    Success {
        /// Always false.
        error: bool,
        /// Always 200.
        code: u16,
        /// The value returned by the action.
        result: Value,
    },
    /// The transaction was rejected or aborted.
    Failure {
        /// Always true.
        error: bool,
        /// HTTP-style status.
        code: u16,
        /// Stable numeric error code.
        #[serde(rename = "errorNum")]
        error_num: u16,
        /// Human-readable message.
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl ApiResponse {
    /// Builds the success envelope around an action result.
    #[must_use]
    pub fn success(result: Value) -> Self {
        ApiResponse::Success {
            error: false,
            code: STATUS_OK,
            result,
        }
    }

    /// Builds the failure envelope for an error at a given status.
    #[must_use]
    pub fn failure(code: u16, error: &KeystoneError) -> Self {
        ApiResponse::Failure {
            error: true,
            code,
            error_num: error.code().as_u16(),
            error_message: error.to_string(),
        }
    }

    /// Returns true for the failure envelope.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Failure { .. })
    }

    /// Returns the HTTP-style status.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            ApiResponse::Success { code, .. } | ApiResponse::Failure { code, .. } => *code,
        }
    }
}

/// Selects the HTTP-style status for an error surfaced before the
/// action ran.
fn rejection_status(error: &KeystoneError) -> u16 {
    match error {
        KeystoneError::InvalidSpecification { .. }
        | KeystoneError::InvalidCollectionName { .. } => STATUS_BAD_REQUEST,
        KeystoneError::CollectionNotFound { .. } => STATUS_NOT_FOUND,
        KeystoneError::LockTimeout { .. } => STATUS_CONFLICT,
        _ => STATUS_INTERNAL,
    }
}

/// Maps a transaction outcome onto the response envelope.
///
/// Pure and idempotent; never fails.
#[must_use]
pub fn map_outcome(outcome: &Outcome) -> ApiResponse {
    match outcome {
        Outcome::Committed(result) => ApiResponse::success(result.clone()),
        Outcome::Rejected(error) => ApiResponse::failure(rejection_status(error), error),
        Outcome::Aborted(cause) => ApiResponse::failure(STATUS_INTERNAL, cause.error()),
    }
}
