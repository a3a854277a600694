//! The collection registry (catalog).
//!
//! Maps collection names and numeric identifiers to live collection
//! handles. Resolution is side-effect-free: it validates existence and
//! never takes a transaction lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use keystone_common::constants::MAX_COLLECTION_NAME_LEN;
use keystone_common::error::{KeystoneError, KeystoneResult};
use keystone_common::types::{CollectionId, CollectionRef};

use crate::collection::{Collection, CollectionLimits};

/// The catalog of live collections.
pub struct CollectionRegistry {
    /// Collections by identifier.
    by_id: RwLock<HashMap<CollectionId, Arc<Collection>>>,
    /// Name to identifier index.
    by_name: RwLock<HashMap<String, CollectionId>>,
    /// Next collection identifier.
    next_id: AtomicU64,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(CollectionId::MIN.as_u64()),
        }
    }

    /// Creates a collection with default limits.
    pub fn create(&self, name: impl Into<String>) -> KeystoneResult<Arc<Collection>> {
        self.create_with_limits(name, CollectionLimits::default())
    }

    /// Creates a collection with explicit limits.
    pub fn create_with_limits(
        &self,
        name: impl Into<String>,
        limits: CollectionLimits,
    ) -> KeystoneResult<Arc<Collection>> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_COLLECTION_NAME_LEN {
            return Err(KeystoneError::InvalidCollectionName { name });
        }

        let mut by_name = self.by_name.write();
        if by_name.contains_key(&name) {
            return Err(KeystoneError::DuplicateCollection { name });
        }

        let id = CollectionId::new(self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
        let collection = Arc::new(Collection::new(id, name.clone(), limits));

        by_name.insert(name.clone(), id);
        self.by_id.write().insert(id, Arc::clone(&collection));

        info!(collection = %name, id = %id, "collection created");
        Ok(collection)
    }

    /// Drops a collection by name.
    pub fn drop_collection(&self, name: &str) -> KeystoneResult<()> {
        let mut by_name = self.by_name.write();
        let id = by_name
            .remove(name)
            .ok_or_else(|| KeystoneError::CollectionNotFound {
                reference: name.to_string(),
            })?;
        self.by_id.write().remove(&id);

        info!(collection = %name, id = %id, "collection dropped");
        Ok(())
    }

    /// Returns the collection with the given identifier.
    #[must_use]
    pub fn get_by_id(&self, id: CollectionId) -> Option<Arc<Collection>> {
        self.by_id.read().get(&id).cloned()
    }

    /// Returns the collection with the given name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Collection>> {
        let id = *self.by_name.read().get(name)?;
        self.get_by_id(id)
    }

    /// Resolves a collection reference to a live handle.
    ///
    /// Id references look up by identifier only. Name references that
    /// consist solely of digits are tried as an identifier first and
    /// fall back to name lookup if no such identifier exists.
    #[must_use]
    pub fn resolve(&self, reference: &CollectionRef) -> Option<Arc<Collection>> {
        match reference {
            CollectionRef::Id(id) => self.get_by_id(*id),
            CollectionRef::Name(name) => {
                if let Some(id) = reference.as_numeric() {
                    if let Some(collection) = self.get_by_id(id) {
                        return Some(collection);
                    }
                }
                self.get_by_name(name)
            }
        }
    }

    /// Returns the number of live collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    /// Returns true if the registry holds no collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("collections", &self.len())
            .finish()
    }
}
