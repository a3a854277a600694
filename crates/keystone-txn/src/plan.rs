//! Lock plans.
//!
//! A lock plan turns a transaction's resolved read and write handle
//! sets into the ordered list of locks to acquire:
//!
//! - write mode subsumes read mode for a collection named in both sets,
//!   so each collection appears exactly once;
//! - entries are sorted ascending by collection id, the canonical order
//!   shared by every transaction. With all transactions acquiring in
//!   the same global order, circular wait cannot form.

use std::collections::BTreeMap;
use std::sync::Arc;

use keystone_common::types::CollectionId;
use keystone_store::Collection;

use crate::lock::LockMode;

/// One lock to acquire.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// The resolved collection handle.
    pub collection: Arc<Collection>,
    /// The effective lock mode.
    pub mode: LockMode,
}

/// The ordered set of locks a transaction needs.
#[derive(Debug, Clone, Default)]
pub struct LockPlan {
    entries: Vec<PlanEntry>,
}

impl LockPlan {
    /// Builds the plan from resolved read and write handles.
    #[must_use]
    pub fn build(read: &[Arc<Collection>], write: &[Arc<Collection>]) -> Self {
        let mut merged: BTreeMap<CollectionId, PlanEntry> = BTreeMap::new();

        for collection in read {
            merged.insert(
                collection.id(),
                PlanEntry {
                    collection: Arc::clone(collection),
                    mode: LockMode::Shared,
                },
            );
        }
        for collection in write {
            merged.insert(
                collection.id(),
                PlanEntry {
                    collection: Arc::clone(collection),
                    mode: LockMode::Exclusive,
                },
            );
        }

        // BTreeMap iteration yields ascending collection ids
        Self {
            entries: merged.into_values().collect(),
        }
    }

    /// Returns the planned lock acquisitions in canonical order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Returns the number of planned locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no locks are planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
