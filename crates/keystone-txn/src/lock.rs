//! Lock management for transaction isolation.
//!
//! This module implements a per-collection lock manager supporting:
//! - Shared (read) and exclusive (write) modes
//! - Bounded waiting with a per-acquisition timeout
//! - A zero timeout meaning "wait indefinitely"
//!
//! # Lock Compatibility
//!
//! ```text
//!          │ S  │ X  │
//! ─────────┼────┼────┤
//!     S    │ ✓  │ ✗  │
//!     X    │ ✗  │ ✗  │
//! ```
//!
//! The manager itself does no deadlock detection. Transactions acquire
//! their locks in one canonical order (ascending collection id, see the
//! lock plan), which makes circular wait structurally impossible.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use keystone_common::constants::LOCK_RETRY_INTERVAL_MICROS;
use keystone_common::types::{CollectionId, TxnId};

/// Lock mode for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock (read lock).
    Shared,
    /// Exclusive lock (write lock).
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    #[must_use]
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Returns true if holding `self` makes holding `other` redundant.
    #[must_use]
    pub fn subsumes(&self, other: &LockMode) -> bool {
        match self {
            LockMode::Exclusive => true,
            LockMode::Shared => *other == LockMode::Shared,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    /// Lock was granted.
    Granted,
    /// Lock acquisition timed out; nothing is held.
    Timeout,
}

impl LockResult {
    /// Returns true if the lock was successfully acquired.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        *self == LockResult::Granted
    }
}

/// Current holders of one collection's lock.
#[derive(Debug, Default)]
struct LockState {
    /// The exclusive holder, if any.
    exclusive: Option<TxnId>,
    /// Shared holders.
    shared: HashSet<TxnId>,
}

impl LockState {
    fn can_grant(&self, txn_id: TxnId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.exclusive.is_none() || self.exclusive == Some(txn_id),
            LockMode::Exclusive => {
                (self.exclusive.is_none() || self.exclusive == Some(txn_id))
                    && self.shared.is_empty()
            }
        }
    }

    fn grant(&mut self, txn_id: TxnId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                self.shared.insert(txn_id);
            }
            LockMode::Exclusive => {
                self.exclusive = Some(txn_id);
            }
        }
    }

    fn release(&mut self, txn_id: TxnId) -> bool {
        if self.exclusive == Some(txn_id) {
            self.exclusive = None;
            true
        } else {
            self.shared.remove(&txn_id)
        }
    }

    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

/// Statistics about the lock manager.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Total lock acquisitions.
    pub acquisitions: AtomicU64,
    /// Total lock releases.
    pub releases: AtomicU64,
    /// Total acquisitions that had to wait.
    pub waits: AtomicU64,
    /// Total timeouts.
    pub timeouts: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total acquisition attempts that reached the lock table.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.acquisitions.load(AtomicOrdering::Relaxed)
            + self.timeouts.load(AtomicOrdering::Relaxed)
    }
}

/// Configuration for the lock manager.
#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// Interval between acquisition retries while waiting.
    pub retry_interval: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_micros(LOCK_RETRY_INTERVAL_MICROS),
        }
    }
}

/// The lock manager for collection-level transaction locks.
pub struct LockManager {
    /// All locks, keyed by collection.
    table: Mutex<HashMap<CollectionId, LockState>>,
    /// Configuration.
    config: LockManagerConfig,
    /// Statistics.
    stats: LockStats,
}

impl LockManager {
    /// Creates a new lock manager with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LockManagerConfig::default())
    }

    /// Creates a lock manager with custom configuration.
    #[must_use]
    pub fn with_config(config: LockManagerConfig) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            config,
            stats: LockStats::new(),
        }
    }

    /// Tries to acquire a lock without waiting.
    ///
    /// Returns true if the lock was granted.
    pub fn try_acquire(&self, txn_id: TxnId, collection: CollectionId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        let state = table.entry(collection).or_default();
        if state.can_grant(txn_id, mode) {
            state.grant(txn_id, mode);
            true
        } else {
            false
        }
    }

    /// Acquires a lock, waiting up to `timeout`.
    ///
    /// A `timeout` of [`Duration::ZERO`] waits indefinitely. On timeout
    /// nothing is held for this collection.
    pub fn acquire(
        &self,
        txn_id: TxnId,
        collection: CollectionId,
        mode: LockMode,
        timeout: Duration,
    ) -> LockResult {
        let start = Instant::now();
        let mut waited = false;

        loop {
            if self.try_acquire(txn_id, collection, mode) {
                self.stats
                    .acquisitions
                    .fetch_add(1, AtomicOrdering::Relaxed);
                debug!(txn = %txn_id, collection = %collection, mode = %mode, "lock granted");
                return LockResult::Granted;
            }

            if !waited {
                waited = true;
                self.stats.waits.fetch_add(1, AtomicOrdering::Relaxed);
            }

            if !timeout.is_zero() && start.elapsed() >= timeout {
                self.stats.timeouts.fetch_add(1, AtomicOrdering::Relaxed);
                warn!(
                    txn = %txn_id,
                    collection = %collection,
                    mode = %mode,
                    waited_ms = start.elapsed().as_millis() as u64,
                    "lock acquisition timed out"
                );
                return LockResult::Timeout;
            }

            std::thread::sleep(self.config.retry_interval);
        }
    }

    /// Releases a lock held by a transaction.
    ///
    /// Returns true if the transaction held a lock on the collection.
    pub fn release(&self, txn_id: TxnId, collection: CollectionId) -> bool {
        let mut table = self.table.lock();
        if let Some(state) = table.get_mut(&collection) {
            if state.release(txn_id) {
                self.stats.releases.fetch_add(1, AtomicOrdering::Relaxed);
                if state.is_free() {
                    table.remove(&collection);
                }
                return true;
            }
        }
        false
    }

    /// Returns statistics about the lock manager.
    #[must_use]
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Returns the number of collections with at least one holder.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.table.lock().len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("lock_count", &self.lock_count())
            .finish()
    }
}

/// The locks granted to one transaction attempt.
///
/// Records grants in acquisition order and releases them in reverse
/// order, exactly once: either through [`GrantedLocks::release`] or on
/// drop. Dropping covers every abnormal exit path, so no failed attempt
/// can leave a lock behind.
pub struct GrantedLocks {
    manager: Arc<LockManager>,
    txn_id: TxnId,
    held: Vec<CollectionId>,
    released: bool,
}

impl GrantedLocks {
    /// Creates an empty holder for a transaction.
    #[must_use]
    pub fn new(manager: Arc<LockManager>, txn_id: TxnId) -> Self {
        Self {
            manager,
            txn_id,
            held: Vec::new(),
            released: false,
        }
    }

    /// Records a granted lock.
    pub fn push(&mut self, collection: CollectionId) {
        self.held.push(collection);
    }

    /// Returns the number of held locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if no locks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Releases all held locks in reverse acquisition order.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for collection in self.held.iter().rev() {
            self.manager.release(self.txn_id, *collection);
        }
        self.held.clear();
    }
}

impl Drop for GrantedLocks {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for GrantedLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantedLocks")
            .field("txn_id", &self.txn_id)
            .field("held", &self.held.len())
            .finish()
    }
}
