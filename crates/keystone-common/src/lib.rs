//! # keystone-common
//!
//! Common types, errors, and constants for KeystoneDB.
//!
//! This crate provides the foundational types used across all KeystoneDB
//! components. It includes:
//!
//! - **Types**: Core identifiers (`CollectionId`, `TxnId`) and the
//!   `CollectionRef` name-or-id reference
//! - **Errors**: Unified error handling with `KeystoneError` and stable
//!   numeric error codes
//! - **Constants**: System-wide limits and defaults
//!
//! ## Example
//!
//! ```rust
//! use keystone_common::types::{CollectionId, CollectionRef, TxnId};
//! use keystone_common::error::KeystoneResult;
//!
//! fn example() -> KeystoneResult<()> {
//!     let id = CollectionId::new(42);
//!     let txn = TxnId::new(1);
//!     let by_name = CollectionRef::name("orders");
//!     let by_id = CollectionRef::id(id);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, KeystoneError, KeystoneResult};
pub use types::{CollectionId, CollectionRef, TxnId};
