//! # keystone-api
//!
//! Transport-agnostic request surface for KeystoneDB transactions.
//!
//! This crate provides:
//!
//! - **Request parsing**: Turns the JSON transaction payload
//!   (`collections.read`/`collections.write`, `waitForSync`,
//!   `lockTimeout`, `params`) into a validated specification.
//!
//! - **Response mapping**: Maps every transaction outcome onto the
//!   wire envelope, `{error, code, result}` on success and
//!   `{error, code, errorNum, errorMessage}` on failure.
//!
//! - **The handler**: [`handler::run_transaction`] glues parse,
//!   execute, and map into one infallible entry point that any
//!   transport can call.
//!
//! The action itself is a typed argument supplied by the host process,
//! never code carried inside the payload.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// The transaction entry point.
pub mod handler;

/// Payload parsing and validation.
pub mod request;

/// Outcome-to-envelope mapping.
pub mod response;

pub use handler::run_transaction;
pub use request::parse_request;
pub use response::{map_outcome, ApiResponse};
