//! Write batches.
//!
//! A write batch is the unit of mutation handed to a collection at
//! commit time. Batches are staged by the transaction context while the
//! action runs and applied all-or-nothing.

use serde_json::Value;

/// A single staged mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace the document stored under `key`.
    Put {
        /// Document key.
        key: String,
        /// Document body.
        document: Value,
    },
    /// Remove the document stored under `key`, if present.
    Remove {
        /// Document key.
        key: String,
    },
}

impl WriteOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } => key,
            WriteOp::Remove { key } => key,
        }
    }
}

/// An ordered list of staged mutations for one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an insert-or-replace.
    pub fn put(&mut self, key: impl Into<String>, document: Value) {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            document,
        });
    }

    /// Stages a removal.
    pub fn remove(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::Remove { key: key.into() });
    }

    /// Returns the staged operations in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_ordering() {
        let mut batch = WriteBatch::new();
        batch.put("a", json!({"v": 1}));
        batch.remove("b");
        batch.put("a", json!({"v": 2}));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ops()[0].key(), "a");
        assert!(matches!(batch.ops()[1], WriteOp::Remove { .. }));
        // Later operations on the same key stay ordered after earlier ones
        assert_eq!(
            batch.ops()[2],
            WriteOp::Put {
                key: "a".to_string(),
                document: json!({"v": 2})
            }
        );
    }

    #[test]
    fn test_empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
