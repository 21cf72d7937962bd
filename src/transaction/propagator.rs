// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Association of asynchronous call chains with transactions.
//!
//! A call chain is a future (or a synchronous callback) run inside a task-local
//! scope holding the chain's transaction. The scope is re-entered every time
//! the future is polled, so concurrently interleaved chains on one thread each
//! see their own transaction.
//!
//! Anything that leaves the chain (a spawned task, a callback stored and run
//! later by an I/O primitive) must be wrapped with [`bind`] or [`bind_fn`] at
//! the point it is created. Unbound work sees no transaction and its metrics
//! are recorded globally only.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::{Transaction, TransactionLifecycle};
use super::id::TransactionId;

tokio::task_local! {
    static CURRENT_TRANSACTION: Option<Arc<Transaction>>;
}

/// A future running inside a transaction scope.
pub type Bound<F> = TaskLocalFuture<Option<Arc<Transaction>>, F>;

/// The transaction of the chain the caller is running in.
///
/// Returns the transaction even after it has ended; recording into it is then
/// counted as a dropped sample rather than misattributed.
pub fn current() -> Option<Arc<Transaction>> {
    CURRENT_TRANSACTION
        .try_with(|current| current.clone())
        .ok()
        .flatten()
}

/// Run `future` as a chain associated with `transaction`.
///
/// Passing `None` runs it detached from any transaction.
pub fn scope<F: Future>(transaction: Option<Arc<Transaction>>, future: F) -> Bound<F> {
    CURRENT_TRANSACTION.scope(transaction, future)
}

/// Run a synchronous callback as part of `transaction`'s chain.
pub fn sync_scope<F, R>(transaction: Option<Arc<Transaction>>, f: F) -> R
where
    F: FnOnce() -> R,
{
    CURRENT_TRANSACTION.sync_scope(transaction, f)
}

/// Carry the caller's transaction onto `future`.
pub fn bind<F: Future>(future: F) -> Bound<F> {
    scope(current(), future)
}

/// Carry the caller's transaction onto a callback that runs later.
pub fn bind_fn<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let transaction = current();
    move || sync_scope(transaction, f)
}

/// Spawn `future` on the runtime, keeping the caller's transaction.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(bind(future))
}

/// Creates transactions and tracks the ones still active.
#[derive(Default)]
pub struct ContextPropagator {
    active: Mutex<HashMap<TransactionId, Weak<Transaction>>>,
}

impl ContextPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transaction owned by `lifecycle` and register it as active.
    ///
    /// The transaction is not yet associated with any chain; run work under it
    /// with [`scope`].
    pub fn start_transaction(&self, lifecycle: Weak<dyn TransactionLifecycle>) -> Arc<Transaction> {
        let transaction = Arc::new(Transaction::new(lifecycle));
        self.active
            .lock()
            .insert(transaction.id(), Arc::downgrade(&transaction));
        debug!(transaction = %transaction.id().short(), "Transaction started");
        transaction
    }

    /// Forget an ended transaction. Returns whether it was registered.
    pub fn release(&self, id: TransactionId) -> bool {
        self.active.lock().remove(&id).is_some()
    }

    /// Number of started transactions not yet released.
    ///
    /// Entries whose transaction was dropped without reaching its owner are
    /// pruned here.
    pub fn active_count(&self) -> usize {
        let mut active = self.active.lock();
        active.retain(|_, transaction| transaction.strong_count() > 0);
        active.len()
    }
}

impl std::fmt::Debug for ContextPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPropagator")
            .field("active", &self.active.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn detached() -> Arc<Transaction> {
        Arc::new(Transaction::detached())
    }

    #[test]
    fn test_no_transaction_outside_scope() {
        assert!(current().is_none());
    }

    #[test]
    fn test_sync_scope() {
        let txn = detached();
        let seen = sync_scope(Some(Arc::clone(&txn)), current);
        assert_eq!(seen.map(|t| t.id()), Some(txn.id()));
        assert!(current().is_none());
    }

    #[test]
    fn test_nested_scope_can_start_fresh() {
        let outer = detached();
        let inner = detached();
        sync_scope(Some(Arc::clone(&outer)), || {
            sync_scope(Some(Arc::clone(&inner)), || {
                assert_eq!(current().unwrap().id(), inner.id());
            });
            sync_scope(None, || assert!(current().is_none()));
            assert_eq!(current().unwrap().id(), outer.id());
        });
    }

    #[test]
    fn test_bind_fn_carries_transaction() {
        let txn = detached();
        let callback = sync_scope(Some(Arc::clone(&txn)), || bind_fn(current));

        // Invoked outside the original chain, as an I/O completion would be.
        let seen = callback();
        assert_eq!(seen.unwrap().id(), txn.id());
    }

    #[tokio::test]
    async fn test_scope_survives_suspension() {
        let txn = detached();
        scope(Some(Arc::clone(&txn)), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(current().unwrap().id(), txn.id());
        })
        .await;
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_interleaved_chains_do_not_cross() {
        let first = detached();
        let second = detached();

        let a = scope(Some(Arc::clone(&first)), async {
            for _ in 0..5 {
                tokio::task::yield_now().await;
                assert_eq!(current().unwrap().id(), first.id());
            }
        });
        let b = scope(Some(Arc::clone(&second)), async {
            for _ in 0..5 {
                tokio::task::yield_now().await;
                assert_eq!(current().unwrap().id(), second.id());
            }
        });
        tokio::join!(a, b);
    }

    #[tokio::test]
    async fn test_spawned_task_needs_bind() {
        let txn = detached();
        let (bound, unbound) = scope(Some(Arc::clone(&txn)), async {
            let bound = spawn(async { current().map(|t| t.id()) });
            let unbound = tokio::spawn(async { current().map(|t| t.id()) });
            (bound.await.unwrap(), unbound.await.unwrap())
        })
        .await;

        assert_eq!(bound, Some(txn.id()));
        assert_eq!(unbound, None);
    }

    #[test]
    fn test_registry_tracks_active() {
        let propagator = ContextPropagator::new();
        let lifecycle: Weak<dyn TransactionLifecycle> = Weak::<NoopLifecycle>::new();
        let txn = propagator.start_transaction(lifecycle.clone());
        let dropped = propagator.start_transaction(lifecycle);
        assert_eq!(propagator.active_count(), 2);

        drop(dropped);
        assert_eq!(propagator.active_count(), 1);

        assert!(propagator.release(txn.id()));
        assert!(!propagator.release(txn.id()));
        assert_eq!(propagator.active_count(), 0);
    }

    struct NoopLifecycle;

    impl TransactionLifecycle for NoopLifecycle {
        fn transaction_finished(&self, _transaction: &Arc<Transaction>) {}
        fn sample_dropped(&self, _transaction: &Transaction) {}
        fn transaction_abandoned(&self, _transaction: &Transaction) {}
    }
}
