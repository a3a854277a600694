//! The transaction coordinator.
//!
//! The coordinator is the single entry point for running caller logic
//! under ACID guarantees:
//!
//! 1. Validate the transaction specification.
//! 2. Resolve every referenced collection; any miss rejects the
//!    transaction before a single lock is requested.
//! 3. Build the canonical-ordered lock plan and acquire all locks;
//!    a timeout releases every partial grant and rejects.
//! 4. Open a transaction context over the granted handles.
//! 5. Invoke the action exactly once.
//! 6. Commit on normal return (honoring the durability flag), roll
//!    back on action failure or commit fault.
//!
//! Locks are released on every exit path. The coordinator holds no
//! shared mutable state beyond the lock table, so transactions over
//! disjoint collections run fully in parallel while overlapping ones
//! serialize at lock acquisition.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use keystone_common::constants::DEFAULT_LOCK_TIMEOUT_MS;
use keystone_common::error::{KeystoneError, KeystoneResult};
use keystone_common::types::{CollectionRef, TxnId};
use keystone_store::{Collection, CollectionRegistry};

use crate::context::{AccessMode, TransactionContext};
use crate::lock::{GrantedLocks, LockManager, LockMode, LockResult};
use crate::plan::LockPlan;

/// Options controlling a single transaction.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// Force a durability sync before acknowledging the commit.
    pub wait_for_sync: bool,
    /// Maximum wait per lock acquisition; zero waits indefinitely.
    pub lock_timeout: Duration,
    /// Opaque value passed through to the action.
    pub params: Value,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            wait_for_sync: false,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            params: Value::Null,
        }
    }
}

/// A declarative transaction specification.
///
/// Names the collections the action will touch and how. The action
/// itself is passed to [`TransactionCoordinator::execute`] alongside
/// the specification; the coordinator never inspects it.
#[derive(Debug, Clone, Default)]
pub struct TransactionSpec {
    /// Collections needing read access.
    pub read: Vec<CollectionRef>,
    /// Collections needing write access.
    pub write: Vec<CollectionRef>,
    /// Execution options.
    pub options: TransactionOptions,
}

impl TransactionSpec {
    /// Creates an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection to the read set.
    #[must_use]
    pub fn read(mut self, reference: impl Into<CollectionRef>) -> Self {
        self.read.push(reference.into());
        self
    }

    /// Adds a collection to the write set.
    #[must_use]
    pub fn write(mut self, reference: impl Into<CollectionRef>) -> Self {
        self.write.push(reference.into());
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks that the specification is well-formed.
    pub fn validate(&self) -> KeystoneResult<()> {
        if self.read.is_empty() && self.write.is_empty() {
            return Err(KeystoneError::invalid_specification(
                "at least one collection must be declared for read or write",
            ));
        }
        Ok(())
    }
}

/// Caller-supplied transaction logic.
///
/// The coordinator invokes `run` exactly once per transaction, after
/// all locks are granted, and treats the action as opaque. A returned
/// error aborts the transaction and rolls back all staged writes.
pub trait TransactionAction {
    /// Runs the action against the locked collections.
    fn run(&self, ctx: &mut TransactionContext, params: &Value) -> KeystoneResult<Value>;
}

impl<F> TransactionAction for F
where
    F: Fn(&mut TransactionContext, &Value) -> KeystoneResult<Value>,
{
    fn run(&self, ctx: &mut TransactionContext, params: &Value) -> KeystoneResult<Value> {
        self(ctx, params)
    }
}

/// Why a transaction that reached the action was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    /// The action itself failed; surfaced as-is.
    User(KeystoneError),
    /// The engine faulted during commit.
    Internal(KeystoneError),
}

impl AbortCause {
    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &KeystoneError {
        match self {
            AbortCause::User(e) | AbortCause::Internal(e) => e,
        }
    }
}

/// The result of one coordinator invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The action ran and its writes are visible in the store.
    Committed(Value),
    /// The action ran (or commit was attempted) and all work was
    /// rolled back.
    Aborted(AbortCause),
    /// Rejected before the action was invoked.
    Rejected(KeystoneError),
}

impl Outcome {
    /// Returns true if the transaction committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    /// Returns the committed value, if any.
    #[must_use]
    pub fn committed_value(&self) -> Option<&Value> {
        match self {
            Outcome::Committed(value) => Some(value),
            _ => None,
        }
    }
}

/// Statistics about the coordinator.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Total transactions submitted.
    pub started: AtomicU64,
    /// Total transactions committed.
    pub committed: AtomicU64,
    /// Total transactions aborted after the action started.
    pub aborted: AtomicU64,
    /// Total transactions rejected before the action started.
    pub rejected: AtomicU64,
}

/// The transaction coordinator.
pub struct TransactionCoordinator {
    /// The collection catalog used for resolution.
    registry: Arc<CollectionRegistry>,
    /// The shared lock table.
    locks: Arc<LockManager>,
    /// Next transaction ID.
    next_txn_id: AtomicU64,
    /// Statistics.
    stats: CoordinatorStats,
}

impl TransactionCoordinator {
    /// Creates a coordinator over a registry with its own lock manager.
    #[must_use]
    pub fn new(registry: Arc<CollectionRegistry>) -> Self {
        Self::with_lock_manager(registry, Arc::new(LockManager::new()))
    }

    /// Creates a coordinator sharing an existing lock manager.
    #[must_use]
    pub fn with_lock_manager(registry: Arc<CollectionRegistry>, locks: Arc<LockManager>) -> Self {
        Self {
            registry,
            locks,
            next_txn_id: AtomicU64::new(TxnId::MIN.as_u64()),
            stats: CoordinatorStats::default(),
        }
    }

    /// Returns the collection registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    /// Returns the lock manager.
    #[must_use]
    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Returns statistics.
    #[must_use]
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Resolves every reference or fails on the first miss.
    fn resolve_all(&self, refs: &[CollectionRef]) -> KeystoneResult<Vec<Arc<Collection>>> {
        refs.iter()
            .map(|reference| {
                self.registry.resolve(reference).ok_or_else(|| {
                    KeystoneError::CollectionNotFound {
                        reference: reference.to_string(),
                    }
                })
            })
            .collect()
    }

    /// Runs a transaction to completion.
    ///
    /// Exactly one of commit or rollback executes per invocation that
    /// reaches the action; locks are released on every exit path.
    pub fn execute(&self, spec: &TransactionSpec, action: &dyn TransactionAction) -> Outcome {
        self.stats.started.fetch_add(1, AtomicOrdering::Relaxed);

        if let Err(e) = spec.validate() {
            self.stats.rejected.fetch_add(1, AtomicOrdering::Relaxed);
            return Outcome::Rejected(e);
        }

        // Resolve before any lock is requested
        let read = match self.resolve_all(&spec.read) {
            Ok(handles) => handles,
            Err(e) => {
                self.stats.rejected.fetch_add(1, AtomicOrdering::Relaxed);
                return Outcome::Rejected(e);
            }
        };
        let write = match self.resolve_all(&spec.write) {
            Ok(handles) => handles,
            Err(e) => {
                self.stats.rejected.fetch_add(1, AtomicOrdering::Relaxed);
                return Outcome::Rejected(e);
            }
        };

        let plan = LockPlan::build(&read, &write);
        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, AtomicOrdering::SeqCst));
        debug!(txn = %txn_id, locks = plan.len(), "transaction admitted");

        let mut granted = GrantedLocks::new(Arc::clone(&self.locks), txn_id);
        for entry in plan.entries() {
            let wait_start = Instant::now();
            match self.locks.acquire(
                txn_id,
                entry.collection.id(),
                entry.mode,
                spec.options.lock_timeout,
            ) {
                LockResult::Granted => granted.push(entry.collection.id()),
                LockResult::Timeout => {
                    // Drop releases the partial grants in reverse order
                    drop(granted);
                    self.stats.rejected.fetch_add(1, AtomicOrdering::Relaxed);
                    return Outcome::Rejected(KeystoneError::LockTimeout {
                        collection: entry.collection.name().to_string(),
                        waited_ms: u64::try_from(wait_start.elapsed().as_millis())
                            .unwrap_or(u64::MAX),
                    });
                }
            }
        }

        let handles = plan
            .entries()
            .iter()
            .map(|entry| {
                let mode = match entry.mode {
                    LockMode::Shared => AccessMode::Read,
                    LockMode::Exclusive => AccessMode::Write,
                };
                (Arc::clone(&entry.collection), mode)
            })
            .collect();
        let mut ctx = TransactionContext::new(txn_id, handles);

        let outcome = match action.run(&mut ctx, &spec.options.params) {
            Ok(value) => match ctx.commit(spec.options.wait_for_sync) {
                Ok(()) => {
                    self.stats.committed.fetch_add(1, AtomicOrdering::Relaxed);
                    info!(txn = %txn_id, "transaction committed");
                    Outcome::Committed(value)
                }
                Err(e) => {
                    // A commit fault applies nothing; discard the staging
                    let _ = ctx.rollback();
                    self.stats.aborted.fetch_add(1, AtomicOrdering::Relaxed);
                    warn!(txn = %txn_id, error = %e, "commit fault, transaction rolled back");
                    Outcome::Aborted(AbortCause::Internal(e))
                }
            },
            Err(e) => {
                let _ = ctx.rollback();
                self.stats.aborted.fetch_add(1, AtomicOrdering::Relaxed);
                debug!(txn = %txn_id, error = %e, "action failed, transaction rolled back");
                Outcome::Aborted(AbortCause::User(e))
            }
        };

        granted.release();
        outcome
    }
}

impl fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("collections", &self.registry.len())
            .field("lock_count", &self.locks.lock_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_store::CollectionLimits;
    use serde_json::json;

    fn setup(names: &[&str]) -> TransactionCoordinator {
        let registry = Arc::new(CollectionRegistry::new());
        for name in names {
            registry.create(*name).unwrap();
        }
        TransactionCoordinator::new(registry)
    }

    /// Increments a counter document and returns the new value.
    fn increment_counter(ctx: &mut TransactionContext, _params: &Value) -> KeystoneResult<Value> {
        let current = ctx
            .get("orders", "counter")?
            .and_then(|doc| doc.get("value").and_then(Value::as_i64))
            .unwrap_or(0);
        let next = current + 1;
        ctx.put("orders", "counter", json!({ "value": next }))?;
        Ok(json!(next))
    }

    #[test]
    fn test_counter_increments_across_transactions() {
        let coordinator = setup(&["orders"]);
        let spec = TransactionSpec::new().write("orders");

        let outcome = coordinator.execute(&spec, &increment_counter);
        assert_eq!(outcome, Outcome::Committed(json!(1)));

        let outcome = coordinator.execute(&spec, &increment_counter);
        assert_eq!(outcome, Outcome::Committed(json!(2)));

        assert_eq!(
            coordinator.stats().committed.load(AtomicOrdering::Relaxed),
            2
        );
    }

    #[test]
    fn test_empty_spec_rejected() {
        let coordinator = setup(&[]);
        let spec = TransactionSpec::new();

        let outcome = coordinator.execute(&spec, &increment_counter);
        assert!(matches!(
            outcome,
            Outcome::Rejected(KeystoneError::InvalidSpecification { .. })
        ));
        // The action never ran, no lock was requested
        assert_eq!(coordinator.lock_manager().stats().attempts(), 0);
    }

    #[test]
    fn test_unknown_collection_rejected_before_locking() {
        let coordinator = setup(&["orders"]);
        let spec = TransactionSpec::new()
            .write("orders")
            .read(keystone_common::types::CollectionId::new(999_999));

        let outcome = coordinator.execute(&spec, &increment_counter);
        assert!(matches!(
            outcome,
            Outcome::Rejected(KeystoneError::CollectionNotFound { .. })
        ));
        assert_eq!(coordinator.lock_manager().stats().attempts(), 0);
        assert_eq!(coordinator.lock_manager().lock_count(), 0);
    }

    #[test]
    fn test_action_failure_rolls_back() {
        let coordinator = setup(&["orders"]);
        let spec = TransactionSpec::new().write("orders");

        let failing = |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
            ctx.put("orders", "ghost", json!(1))?;
            Err(KeystoneError::action_failed("deliberate failure"))
        };
        let outcome = coordinator.execute(&spec, &failing);
        assert!(matches!(
            outcome,
            Outcome::Aborted(AbortCause::User(KeystoneError::ActionFailed { .. }))
        ));

        // No mutation from the failed action is visible
        let orders = coordinator.registry().get_by_name("orders").unwrap();
        assert!(orders.is_empty());

        // Locks are free again
        let outcome = coordinator.execute(&spec, &increment_counter);
        assert!(outcome.is_committed());
    }

    #[test]
    fn test_write_through_read_set_aborts() {
        let coordinator = setup(&["x"]);
        let spec = TransactionSpec::new().read("x");

        let sneaky_write = |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
            ctx.put("x", "k", json!(1))?;
            Ok(json!("unreachable"))
        };
        let outcome = coordinator.execute(&spec, &sneaky_write);
        assert!(matches!(
            outcome,
            Outcome::Aborted(AbortCause::User(KeystoneError::CollectionReadOnly { .. }))
        ));
        assert!(coordinator.registry().get_by_name("x").unwrap().is_empty());
    }

    #[test]
    fn test_lock_timeout_leaves_holder_unaffected() {
        let registry = Arc::new(CollectionRegistry::new());
        registry.create("orders").unwrap();
        let coordinator = Arc::new(TransactionCoordinator::new(Arc::clone(&registry)));

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();

        let holder = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || {
                let spec = TransactionSpec::new().write("orders");
                let action =
                    move |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
                        ctx.put("orders", "held", json!(true))?;
                        started_tx.send(()).ok();
                        release_rx.recv().ok();
                        Ok(json!("held"))
                    };
                coordinator.execute(&spec, &action)
            })
        };

        started_rx.recv().unwrap();

        // Second transaction times out after ~1s while the lock is held
        let spec = TransactionSpec::new().write("orders").with_options(TransactionOptions {
            lock_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        let start = Instant::now();
        let outcome = coordinator.execute(&spec, &increment_counter);
        let elapsed = start.elapsed();

        match &outcome {
            Outcome::Rejected(KeystoneError::LockTimeout { waited_ms, .. }) => {
                // The error reports the wait that actually happened
                assert!(*waited_ms >= 1000);
                assert!(*waited_ms < 5000);
            }
            other => panic!("expected a lock timeout, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_secs(5));

        // The in-flight holder is unaffected and commits
        release_tx.send(()).unwrap();
        assert!(holder.join().unwrap().is_committed());
        assert_eq!(
            registry.get_by_name("orders").unwrap().get("held"),
            Some(json!(true))
        );
    }

    #[test]
    fn test_disjoint_transactions_commit_concurrently() {
        let names: Vec<String> = (0..8).map(|i| format!("c{}", i)).collect();
        let registry = Arc::new(CollectionRegistry::new());
        for name in &names {
            registry.create(name.clone()).unwrap();
        }
        let coordinator = Arc::new(TransactionCoordinator::new(registry));

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let coordinator = Arc::clone(&coordinator);
                let name = name.clone();
                std::thread::spawn(move || {
                    let spec = TransactionSpec::new().write(name.as_str());
                    let action = |ctx: &mut TransactionContext,
                                  _params: &Value|
                     -> KeystoneResult<Value> {
                        let target = "doc";
                        // The only writable collection is our own
                        let collection = ctx
                            .is_writable(&name)
                            .then_some(name.as_str())
                            .expect("own collection must be writable");
                        ctx.put(collection, target, json!({"owner": name.clone()}))?;
                        Ok(json!("ok"))
                    };
                    coordinator.execute(&spec, &action)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_committed());
        }
        assert_eq!(
            coordinator.stats().committed.load(AtomicOrdering::Relaxed),
            8
        );
    }

    #[test]
    fn test_overlapping_transactions_all_commit() {
        // Every thread writes the same two collections, presented in
        // opposite orders; canonical ordering prevents deadlock.
        let registry = Arc::new(CollectionRegistry::new());
        registry.create("a").unwrap();
        registry.create("b").unwrap();
        let coordinator = Arc::new(TransactionCoordinator::new(registry));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                std::thread::spawn(move || {
                    let spec = if i % 2 == 0 {
                        TransactionSpec::new().write("a").write("b")
                    } else {
                        TransactionSpec::new().write("b").write("a")
                    };
                    let action = move |ctx: &mut TransactionContext,
                                       _params: &Value|
                     -> KeystoneResult<Value> {
                        let n = ctx
                            .get("a", "n")?
                            .and_then(|v| v.as_i64())
                            .unwrap_or(0);
                        ctx.put("a", "n", json!(n + 1))?;
                        ctx.put("b", "n", json!(n + 1))?;
                        Ok(json!(n + 1))
                    };
                    coordinator.execute(&spec, &action)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_committed());
        }

        // Serialized increments: both collections end at 8
        let a = coordinator.registry().get_by_name("a").unwrap();
        let b = coordinator.registry().get_by_name("b").unwrap();
        assert_eq!(a.get("n"), Some(json!(8)));
        assert_eq!(b.get("n"), Some(json!(8)));
    }

    #[test]
    fn test_wait_for_sync_blocks_on_acknowledgment() {
        let coordinator = setup(&["orders"]);
        let orders = coordinator.registry().get_by_name("orders").unwrap();

        let spec = TransactionSpec::new().write("orders");
        coordinator.execute(&spec, &increment_counter);
        assert_eq!(orders.sync_count(), 0);

        let spec = spec.with_options(TransactionOptions {
            wait_for_sync: true,
            ..Default::default()
        });
        let outcome = coordinator.execute(&spec, &increment_counter);
        assert!(outcome.is_committed());
        // The sync acknowledgment happened before execute returned
        assert_eq!(orders.sync_count(), 1);
    }

    #[test]
    fn test_internal_commit_fault_aborts_and_recovers() {
        let registry = Arc::new(CollectionRegistry::new());
        registry
            .create_with_limits(
                "tiny",
                CollectionLimits {
                    max_documents: 1,
                    ..Default::default()
                },
            )
            .unwrap();
        let coordinator = TransactionCoordinator::new(Arc::clone(&registry));

        let overfill = |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
            ctx.put("tiny", "a", json!(1))?;
            ctx.put("tiny", "b", json!(2))?;
            Ok(json!("too much"))
        };
        let spec = TransactionSpec::new().write("tiny");
        let outcome = coordinator.execute(&spec, &overfill);
        assert!(matches!(
            outcome,
            Outcome::Aborted(AbortCause::Internal(KeystoneError::CollectionFull { .. }))
        ));

        // Store unchanged, coordinator still usable
        let tiny = registry.get_by_name("tiny").unwrap();
        assert!(tiny.is_empty());

        let fits = |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
            ctx.put("tiny", "a", json!(1))?;
            Ok(json!("ok"))
        };
        assert!(coordinator.execute(&spec, &fits).is_committed());
    }

    #[test]
    fn test_params_passed_through() {
        let coordinator = setup(&["orders"]);
        let spec = TransactionSpec::new().write("orders").with_options(TransactionOptions {
            params: json!({"amount": 42}),
            ..Default::default()
        });

        let echo = |_ctx: &mut TransactionContext, params: &Value| -> KeystoneResult<Value> {
            Ok(params.clone())
        };
        let outcome = coordinator.execute(&spec, &echo);
        assert_eq!(outcome, Outcome::Committed(json!({"amount": 42})));
    }

    #[test]
    fn test_numeric_string_reference_resolves() {
        let coordinator = setup(&["orders"]);
        let orders = coordinator.registry().get_by_name("orders").unwrap();
        let id_string = orders.id().to_string();

        let spec = TransactionSpec::new().write(id_string.as_str());
        let count = |ctx: &mut TransactionContext, _params: &Value| -> KeystoneResult<Value> {
            Ok(json!(ctx.count("orders")?))
        };
        let outcome = coordinator.execute(&spec, &count);
        assert_eq!(outcome, Outcome::Committed(json!(0)));
    }
}
