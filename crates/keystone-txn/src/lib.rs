//! # keystone-txn
//!
//! Transaction layer for KeystoneDB.
//!
//! This crate provides server-side ACID transactions with:
//!
//! - **Declarative collection sets**: A transaction names every
//!   collection it will read or write up front; the action never
//!   escapes the declared sets.
//!
//! - **Lock Management**: Collection-level locking with shared (S) and
//!   exclusive (X) modes, bounded acquisition waits, and statistics.
//!
//! - **Deadlock Avoidance**: All locks for a transaction are acquired
//!   in one canonical order (ascending collection id), so circular
//!   wait cannot form and no detector is needed.
//!
//! - **Atomic Commit**: Mutations stage in a per-transaction overlay
//!   and reach the store all-or-nothing at commit.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  TransactionCoordinator                      │
//! │                           │                                  │
//! │     ┌─────────────────────┼─────────────────────┐            │
//! │     │                     │                     │            │
//! │     ▼                     ▼                     ▼            │
//! │ ┌──────────┐       ┌────────────┐       ┌──────────────┐     │
//! │ │ LockPlan │       │ LockManager│       │ Transaction  │     │
//! │ │          │──────▶│            │──────▶│   Context    │     │
//! │ └──────────┘       └────────────┘       └──────────────┘     │
//! │   canonical          S/X grants           staged overlay     │
//! │   ordering           + timeouts           commit/rollback    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! use keystone_txn::{TransactionCoordinator, TransactionSpec};
//! use keystone_store::CollectionRegistry;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CollectionRegistry::new());
//! registry.create("accounts").unwrap();
//! let coordinator = TransactionCoordinator::new(registry);
//!
//! let spec = TransactionSpec::new().write("accounts");
//! let outcome = coordinator.execute(&spec, &|ctx, _params| {
//!     ctx.put("accounts", "alice", json!({"balance": 100}))?;
//!     Ok(json!("done"))
//! });
//! assert!(outcome.is_committed());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Transaction execution.
///
/// This module provides:
/// - [`coordinator::TransactionCoordinator`]: Runs transactions end to end
/// - [`coordinator::TransactionSpec`]: Declarative read/write sets and options
/// - [`coordinator::Outcome`]: Committed, aborted, or rejected
pub mod coordinator;

/// Transaction contexts.
///
/// This module provides:
/// - [`context::TransactionContext`]: The unit of work handed to actions
/// - [`context::AccessMode`]: Declared per-collection access
pub mod context;

/// Lock table implementation.
///
/// This module provides:
/// - [`lock::LockManager`]: Manages all collection locks
/// - [`lock::LockMode`]: Shared and exclusive modes
/// - [`lock::GrantedLocks`]: Scope-bound release of held locks
pub mod lock;

/// Lock planning.
///
/// This module provides:
/// - [`plan::LockPlan`]: Deduplicated, canonically ordered acquisitions
pub mod plan;

pub use context::{AccessMode, ContextState, TransactionContext};
pub use coordinator::{
    AbortCause, CoordinatorStats, Outcome, TransactionAction, TransactionCoordinator,
    TransactionOptions, TransactionSpec,
};
pub use lock::{GrantedLocks, LockManager, LockManagerConfig, LockMode, LockResult, LockStats};
pub use plan::{LockPlan, PlanEntry};
