//! The transaction entry point.
//!
//! Ties the surface together: parse the payload, execute under the
//! coordinator, map the outcome. Transports wrap this in whatever
//! framing they use; the handler itself never fails.

use serde_json::Value;
use tracing::debug;

use keystone_txn::{TransactionAction, TransactionCoordinator};

use crate::request::parse_request;
use crate::response::{map_outcome, ApiResponse};

/// Runs one transaction request end to end.
///
/// The action is supplied by the host as a typed argument rather than
/// carried in the payload, so its presence is guaranteed by the
/// signature. Every path returns a well-formed response envelope.
pub fn run_transaction(
    coordinator: &TransactionCoordinator,
    payload: &Value,
    action: &dyn TransactionAction,
) -> ApiResponse {
    let spec = match parse_request(payload) {
        Ok(spec) => spec,
        Err(error) => {
            debug!(%error, "rejected malformed transaction request");
            return map_outcome(&keystone_txn::Outcome::Rejected(error));
        }
    };
    map_outcome(&coordinator.execute(&spec, action))
}
