//! Transaction contexts.
//!
//! A context is the unit of work handed to the caller's action once
//! every lock is granted. It exposes exactly the collections the
//! transaction declared, enforces their access modes, and stages all
//! mutations in a per-collection overlay. Nothing touches the base
//! store until commit; rollback simply discards the overlays.
//!
//! # Context States
//!
//! ```text
//! ┌────────┐   commit()    ┌───────────┐
//! │ Active │──────────────▶│ Committed │
//! └────────┘               └───────────┘
//!      │
//!      │ rollback()        ┌────────────┐
//!      └──────────────────▶│ RolledBack │
//!                          └────────────┘
//! ```
//!
//! Exactly one of commit or rollback runs per context; a second finish
//! attempt fails with `TransactionFinished`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use keystone_common::error::{KeystoneError, KeystoneResult};
use keystone_common::types::TxnId;
use keystone_store::{Collection, WriteBatch};

/// Access mode the transaction declared for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    Read,
    /// Read and write access.
    Write,
}

impl AccessMode {
    /// Returns true if writes are allowed.
    #[must_use]
    pub fn is_write(&self) -> bool {
        *self == AccessMode::Write
    }
}

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// The action may read and stage writes.
    Active,
    /// Staged writes were applied to the store.
    Committed,
    /// Staged writes were discarded.
    RolledBack,
}

/// One collection as seen from inside the transaction.
struct TxnCollection {
    /// The locked collection handle.
    collection: Arc<Collection>,
    /// Declared access mode.
    mode: AccessMode,
    /// Staged overlay; `None` marks a pending removal.
    overlay: BTreeMap<String, Option<Value>>,
}

impl TxnCollection {
    fn count(&self) -> usize {
        let mut count = self.collection.len();
        for (key, staged) in &self.overlay {
            match staged {
                Some(_) if !self.collection.contains(key) => count += 1,
                None if self.collection.contains(key) => count -= 1,
                _ => {}
            }
        }
        count
    }

    fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, staged) in &self.overlay {
            match staged {
                Some(document) => batch.put(key.clone(), document.clone()),
                None => batch.remove(key.clone()),
            }
        }
        batch
    }
}

/// The unit of work: locked handles plus staged mutations.
///
/// Created by the coordinator after lock acquisition succeeds; lives
/// strictly within one coordinator invocation and is never shared
/// across callers.
pub struct TransactionContext {
    /// The owning transaction.
    txn_id: TxnId,
    /// Collections in declared-handle order.
    collections: Vec<TxnCollection>,
    /// Name to handle index.
    index: HashMap<String, usize>,
    /// Lifecycle state.
    state: ContextState,
}

impl TransactionContext {
    /// Creates a context over the granted collection handles.
    #[must_use]
    pub fn new(txn_id: TxnId, handles: Vec<(Arc<Collection>, AccessMode)>) -> Self {
        let mut collections = Vec::with_capacity(handles.len());
        let mut index = HashMap::with_capacity(handles.len());
        for (collection, mode) in handles {
            index.insert(collection.name().to_string(), collections.len());
            collections.push(TxnCollection {
                collection,
                mode,
                overlay: BTreeMap::new(),
            });
        }
        Self {
            txn_id,
            collections,
            index,
            state: ContextState::Active,
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Returns true if the action may still operate on the context.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ContextState::Active
    }

    /// Returns true if the named collection may be written.
    #[must_use]
    pub fn is_writable(&self, collection: &str) -> bool {
        self.index
            .get(collection)
            .map(|i| self.collections[*i].mode.is_write())
            .unwrap_or(false)
    }

    fn handle(&self, collection: &str) -> KeystoneResult<&TxnCollection> {
        let idx = self.index.get(collection).copied().ok_or_else(|| {
            KeystoneError::UnknownCollectionHandle {
                collection: collection.to_string(),
            }
        })?;
        Ok(&self.collections[idx])
    }

    fn writable_handle(&mut self, collection: &str) -> KeystoneResult<&mut TxnCollection> {
        let idx = self.index.get(collection).copied().ok_or_else(|| {
            KeystoneError::UnknownCollectionHandle {
                collection: collection.to_string(),
            }
        })?;
        let handle = &mut self.collections[idx];
        if !handle.mode.is_write() {
            return Err(KeystoneError::CollectionReadOnly {
                collection: collection.to_string(),
            });
        }
        Ok(handle)
    }

    /// Returns the document stored under `key`, including this
    /// transaction's own staged writes.
    pub fn get(&self, collection: &str, key: &str) -> KeystoneResult<Option<Value>> {
        let handle = self.handle(collection)?;
        match handle.overlay.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(handle.collection.get(key)),
        }
    }

    /// Returns true if a document exists under `key`.
    pub fn contains(&self, collection: &str, key: &str) -> KeystoneResult<bool> {
        Ok(self.get(collection, key)?.is_some())
    }

    /// Returns the document count as seen by this transaction.
    pub fn count(&self, collection: &str) -> KeystoneResult<usize> {
        Ok(self.handle(collection)?.count())
    }

    /// Stages an insert-or-replace of the document under `key`.
    pub fn put(
        &mut self,
        collection: &str,
        key: impl Into<String>,
        document: Value,
    ) -> KeystoneResult<()> {
        let handle = self.writable_handle(collection)?;
        handle.overlay.insert(key.into(), Some(document));
        Ok(())
    }

    /// Stages a removal of the document under `key`.
    pub fn remove(&mut self, collection: &str, key: impl Into<String>) -> KeystoneResult<()> {
        let handle = self.writable_handle(collection)?;
        handle.overlay.insert(key.into(), None);
        Ok(())
    }

    /// Commits the staged mutations to the store.
    ///
    /// Every staged batch is validated before any is applied; a
    /// validation fault leaves the whole store untouched and the
    /// context active, so the coordinator can still roll back. With
    /// `durable` set, each written collection acknowledges a sync
    /// before this returns.
    pub fn commit(&mut self, durable: bool) -> KeystoneResult<()> {
        if self.state != ContextState::Active {
            return Err(KeystoneError::TransactionFinished);
        }

        let staged: Vec<(usize, WriteBatch)> = self
            .collections
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.overlay.is_empty())
            .map(|(i, c)| (i, c.to_batch()))
            .collect();

        for (idx, batch) in &staged {
            self.collections[*idx].collection.validate(batch)?;
        }
        for (idx, batch) in &staged {
            self.collections[*idx].collection.apply(batch)?;
        }
        if durable {
            for (idx, _) in &staged {
                self.collections[*idx].collection.sync();
            }
        }

        self.state = ContextState::Committed;
        debug!(
            txn = %self.txn_id,
            collections = staged.len(),
            durable,
            "transaction committed"
        );
        Ok(())
    }

    /// Discards all staged mutations.
    pub fn rollback(&mut self) -> KeystoneResult<()> {
        if self.state != ContextState::Active {
            return Err(KeystoneError::TransactionFinished);
        }
        for handle in &mut self.collections {
            handle.overlay.clear();
        }
        self.state = ContextState::RolledBack;
        debug!(txn = %self.txn_id, "transaction rolled back");
        Ok(())
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("collections", &self.collections.len())
            .field("state", &self.state)
            .finish()
    }
}
