//! # keystone-store
//!
//! In-memory collection storage and catalog for KeystoneDB.
//!
//! This crate provides the storage-engine side of the transaction
//! coordinator's collaborator interface:
//!
//! - **Collections**: named containers of JSON documents with atomic
//!   batch application and a durability acknowledgment hook
//! - **Write batches**: staged mutations applied all-or-nothing
//! - **Registry**: the catalog mapping names and numeric identifiers to
//!   live collection handles
//!
//! Resolution through the registry is side-effect-free and never takes
//! a transaction lock; locking is the coordinator's concern.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod collection;
pub mod registry;

pub use batch::{WriteBatch, WriteOp};
pub use collection::{Collection, CollectionLimits};
pub use registry::CollectionRegistry;
