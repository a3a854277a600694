//! Collections.
//!
//! A collection is a named container of JSON documents keyed by string.
//! Mutations arrive as [`WriteBatch`]es and are validated before any
//! document is touched, so a failed commit leaves the collection
//! exactly as it was.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use keystone_common::constants::{DEFAULT_MAX_DOCUMENTS, MAX_DOCUMENT_KEY_LEN};
use keystone_common::error::{KeystoneError, KeystoneResult};
use keystone_common::types::CollectionId;

use crate::batch::{WriteBatch, WriteOp};

/// Size limits for a collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionLimits {
    /// Maximum number of documents the collection may hold.
    pub max_documents: usize,
    /// Maximum document key length in bytes.
    pub max_key_len: usize,
}

impl Default for CollectionLimits {
    fn default() -> Self {
        Self {
            max_documents: DEFAULT_MAX_DOCUMENTS,
            max_key_len: MAX_DOCUMENT_KEY_LEN,
        }
    }
}

/// A named container of JSON documents.
///
/// Concurrent readers are safe at any time; the transaction layer is
/// responsible for ensuring at most one writer applies batches at once
/// (it holds the exclusive collection lock while committing).
pub struct Collection {
    /// Stable numeric identifier.
    id: CollectionId,
    /// Collection name.
    name: String,
    /// Document storage.
    documents: RwLock<BTreeMap<String, Value>>,
    /// Size limits.
    limits: CollectionLimits,
    /// Number of acknowledged durability syncs.
    sync_count: AtomicU64,
}

impl Collection {
    /// Creates an empty collection.
    pub(crate) fn new(id: CollectionId, name: impl Into<String>, limits: CollectionLimits) -> Self {
        Self {
            id,
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            limits,
            sync_count: AtomicU64::new(0),
        }
    }

    /// Returns the collection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// Returns the collection name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured limits.
    #[inline]
    #[must_use]
    pub fn limits(&self) -> CollectionLimits {
        self.limits
    }

    /// Returns the document stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.documents.read().get(key).cloned()
    }

    /// Returns true if a document is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.documents.read().contains_key(key)
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Returns all document keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.documents.read().keys().cloned().collect()
    }

    /// Checks a batch against the collection limits without applying it.
    fn check_batch(
        &self,
        documents: &BTreeMap<String, Value>,
        batch: &WriteBatch,
    ) -> KeystoneResult<()> {
        // Key lengths first, then the resulting document count. The
        // count over-approximates when a batch puts the same new key
        // twice, which can only reject a batch early, never admit one
        // past the limit.
        let mut resulting = documents.len();
        for op in batch.ops() {
            if op.key().len() > self.limits.max_key_len {
                return Err(KeystoneError::internal(format!(
                    "document key exceeds {} bytes in collection '{}'",
                    self.limits.max_key_len, self.name
                )));
            }
            match op {
                WriteOp::Put { key, .. } => {
                    if !documents.contains_key(key) {
                        resulting += 1;
                    }
                }
                WriteOp::Remove { key } => {
                    if documents.contains_key(key) {
                        resulting = resulting.saturating_sub(1);
                    }
                }
            }
        }
        if resulting > self.limits.max_documents {
            return Err(KeystoneError::CollectionFull {
                collection: self.name.clone(),
                limit: self.limits.max_documents,
            });
        }
        Ok(())
    }

    /// Validates a write batch without applying it.
    ///
    /// Committing a transaction validates every batch before applying
    /// any of them, so a fault in one collection leaves all of them
    /// untouched. The caller holds the exclusive transaction lock, so
    /// the validated state cannot change before the apply.
    pub fn validate(&self, batch: &WriteBatch) -> KeystoneResult<()> {
        let documents = self.documents.read();
        self.check_batch(&documents, batch)
    }

    /// Applies a write batch atomically.
    ///
    /// The whole batch is validated against the collection limits
    /// before any document is mutated. On error nothing is applied.
    /// Returns the number of operations applied.
    pub fn apply(&self, batch: &WriteBatch) -> KeystoneResult<usize> {
        let mut documents = self.documents.write();
        self.check_batch(&documents, batch)?;

        for op in batch.ops() {
            match op {
                WriteOp::Put { key, document } => {
                    documents.insert(key.clone(), document.clone());
                }
                WriteOp::Remove { key } => {
                    documents.remove(key);
                }
            }
        }

        debug!(
            collection = %self.name,
            ops = batch.len(),
            "applied write batch"
        );
        Ok(batch.len())
    }

    /// Acknowledges a durability sync.
    ///
    /// The in-memory engine has no disk to flush; this blocks only for
    /// the acknowledgment itself and bumps an observable counter so
    /// callers can verify that a durable commit waited for it.
    pub fn sync(&self) {
        self.sync_count.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(collection = %self.name, "sync acknowledged");
    }

    /// Returns the number of acknowledged syncs.
    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.sync_count.load(AtomicOrdering::SeqCst)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_collection() -> Collection {
        Collection::new(CollectionId::new(1), "orders", CollectionLimits::default())
    }

    #[test]
    fn test_apply_batch() {
        let coll = test_collection();
        let mut batch = WriteBatch::new();
        batch.put("a", json!({"total": 10}));
        batch.put("b", json!({"total": 20}));

        assert_eq!(coll.apply(&batch).unwrap(), 2);
        assert_eq!(coll.len(), 2);
        assert_eq!(coll.get("a"), Some(json!({"total": 10})));
        assert!(coll.contains("b"));
    }

    #[test]
    fn test_apply_remove() {
        let coll = test_collection();
        let mut batch = WriteBatch::new();
        batch.put("a", json!(1));
        coll.apply(&batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.remove("a");
        batch.remove("missing");
        coll.apply(&batch).unwrap();

        assert!(coll.is_empty());
    }

    #[test]
    fn test_capacity_limit_rejects_whole_batch() {
        let coll = Collection::new(
            CollectionId::new(1),
            "small",
            CollectionLimits {
                max_documents: 2,
                ..Default::default()
            },
        );

        let mut batch = WriteBatch::new();
        batch.put("a", json!(1));
        coll.apply(&batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.put("b", json!(2));
        batch.put("c", json!(3));
        let err = coll.apply(&batch).unwrap_err();
        assert!(matches!(err, KeystoneError::CollectionFull { limit: 2, .. }));

        // Nothing from the failed batch is visible
        assert_eq!(coll.len(), 1);
        assert!(!coll.contains("b"));
    }

    #[test]
    fn test_remove_frees_capacity() {
        let coll = Collection::new(
            CollectionId::new(1),
            "small",
            CollectionLimits {
                max_documents: 1,
                ..Default::default()
            },
        );

        let mut batch = WriteBatch::new();
        batch.put("a", json!(1));
        coll.apply(&batch).unwrap();

        // Replacing via remove+put stays within the limit
        let mut batch = WriteBatch::new();
        batch.remove("a");
        batch.put("b", json!(2));
        coll.apply(&batch).unwrap();
        assert_eq!(coll.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_oversized_key_rejected() {
        let coll = Collection::new(
            CollectionId::new(1),
            "strict",
            CollectionLimits {
                max_key_len: 4,
                ..Default::default()
            },
        );
        let mut batch = WriteBatch::new();
        batch.put("toolong", json!(1));
        assert!(coll.apply(&batch).is_err());
        assert!(coll.is_empty());
    }

    #[test]
    fn test_validate_does_not_apply() {
        let coll = Collection::new(
            CollectionId::new(1),
            "small",
            CollectionLimits {
                max_documents: 1,
                ..Default::default()
            },
        );

        let mut ok = WriteBatch::new();
        ok.put("a", json!(1));
        coll.validate(&ok).unwrap();
        assert!(coll.is_empty());

        let mut too_big = WriteBatch::new();
        too_big.put("a", json!(1));
        too_big.put("b", json!(2));
        assert!(coll.validate(&too_big).is_err());
    }

    #[test]
    fn test_sync_counter() {
        let coll = test_collection();
        assert_eq!(coll.sync_count(), 0);
        coll.sync();
        coll.sync();
        assert_eq!(coll.sync_count(), 2);
    }
}
