// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent module - the process-wide coordination point.
//!
//! The agent owns the global metric store, the active rename rules and the
//! environment facts, creates transactions, and folds each finished
//! transaction's metrics into the global store.
//!
//! # Example
//!
//! ```rust,ignore
//! use appmon::agent::Agent;
//!
//! let agent = Agent::new();
//! let mut finished = agent.subscribe();
//!
//! agent
//!     .run_in_transaction(|txn| async move {
//!         txn.set_name("OtherTransaction/job");
//!         // ... instrumented work ...
//!         txn.end();
//!     })
//!     .await;
//!
//! let txn = finished.recv().await?;
//! ```

pub mod environment;

pub use environment::Environment;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::metrics::{Metric, MetricStore, RenameRules};
use crate::transaction::{propagator, ContextPropagator, Transaction, TransactionLifecycle};

/// Finished transactions buffered per subscriber before it starts lagging.
const FINISHED_CHANNEL_CAPACITY: usize = 256;

/// Default application name when none is configured.
pub const DEFAULT_APP_NAME: &str = "My Application";

struct AgentShared {
    app_name: String,
    metrics: MetricStore,
    rename_rules: RwLock<Arc<RenameRules>>,
    environment: Environment,
    propagator: ContextPropagator,
    finished: broadcast::Sender<Arc<Transaction>>,
    dropped_samples: AtomicU64,
    abandoned: AtomicU64,
}

impl TransactionLifecycle for AgentShared {
    fn transaction_finished(&self, transaction: &Arc<Transaction>) {
        transaction.merge_into(&self.metrics);
        // No subscribers is not an error.
        let _ = self.finished.send(Arc::clone(transaction));
        self.propagator.release(transaction.id());
    }

    fn sample_dropped(&self, _transaction: &Transaction) {
        self.dropped_samples.fetch_add(1, Ordering::Relaxed);
    }

    fn transaction_abandoned(&self, transaction: &Transaction) {
        transaction.merge_into(&self.metrics);
        self.propagator.release(transaction.id());
        self.abandoned.fetch_add(1, Ordering::Relaxed);
        warn!(
            transaction = %transaction.id().short(),
            name = transaction.name().as_deref().unwrap_or("<unnamed>"),
            metrics = transaction.metrics().len(),
            "Transaction dropped without being ended"
        );
    }
}

/// Handle to the agent. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Agent {
    shared: Arc<AgentShared>,
}

impl Agent {
    /// Create an agent with default settings and no rename rules.
    pub fn new() -> Self {
        Self::build(DEFAULT_APP_NAME.to_string(), RenameRules::new())
    }

    /// Create an agent from resolved configuration.
    pub fn with_config(config: &AgentConfig) -> Self {
        Self::build(
            config.app_name.clone(),
            RenameRules::from_rules(&config.rename_rules),
        )
    }

    fn build(app_name: String, rename_rules: RenameRules) -> Self {
        let (finished, _) = broadcast::channel(FINISHED_CHANNEL_CAPACITY);
        info!(app_name = %app_name, rename_rules = rename_rules.len(), "Agent created");
        Self {
            shared: Arc::new(AgentShared {
                app_name,
                metrics: MetricStore::new(),
                rename_rules: RwLock::new(Arc::new(rename_rules)),
                environment: Environment::new(),
                propagator: ContextPropagator::new(),
                finished,
                dropped_samples: AtomicU64::new(0),
                abandoned: AtomicU64::new(0),
            }),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.shared.app_name
    }

    /// The global (unscoped and merged scoped) metric store.
    pub fn metrics(&self) -> &MetricStore {
        &self.shared.metrics
    }

    /// Get or create a metric in the global store.
    pub fn get_or_create_metric(&self, name: &str, scope: Option<&str>) -> Arc<Metric> {
        self.shared.metrics.get_or_create(name, scope)
    }

    /// The transaction of the calling chain, if any.
    pub fn get_transaction(&self) -> Option<Arc<Transaction>> {
        propagator::current()
    }

    /// Create a transaction owned by this agent.
    ///
    /// Run the work belonging to it under [`propagator::scope`], or use
    /// [`Agent::run_in_transaction`].
    pub fn start_transaction(&self) -> Arc<Transaction> {
        let owner = Arc::downgrade(&self.shared);
        let lifecycle: Weak<dyn TransactionLifecycle> = owner;
        self.shared.propagator.start_transaction(lifecycle)
    }

    /// Start a transaction and run `f` as its chain.
    ///
    /// The transaction is not ended automatically.
    pub async fn run_in_transaction<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce(Arc<Transaction>) -> Fut,
        Fut: Future,
    {
        let transaction = self.start_transaction();
        propagator::scope(Some(Arc::clone(&transaction)), f(transaction)).await
    }

    /// Subscribe to finished transactions.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Transaction>> {
        self.shared.finished.subscribe()
    }

    pub fn environment(&self) -> &Environment {
        &self.shared.environment
    }

    /// The rename rules currently in force.
    pub fn rename_rules(&self) -> Arc<RenameRules> {
        Arc::clone(&*self.shared.rename_rules.read())
    }

    /// Replace the rename rules, e.g. after the collector re-delivers them.
    pub fn set_rename_rules(&self, rules: RenameRules) {
        debug!(rules = rules.len(), "Rename rules replaced");
        *self.shared.rename_rules.write() = Arc::new(rules);
    }

    /// Take the global metrics for reporting, leaving an empty store behind.
    pub fn harvest(&self) -> MetricStore {
        self.shared.metrics.take()
    }

    /// Samples rejected because their transaction had already ended.
    pub fn dropped_samples(&self) -> u64 {
        self.shared.dropped_samples.load(Ordering::Relaxed)
    }

    /// Transactions dropped without being ended. Their metrics were still
    /// merged into the global store.
    pub fn abandoned_transactions(&self) -> u64 {
        self.shared.abandoned.load(Ordering::Relaxed)
    }

    /// Transactions started and not yet ended.
    pub fn active_transactions(&self) -> usize {
        self.shared.propagator.active_count()
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("app_name", &self.shared.app_name)
            .field("metrics", &self.shared.metrics.len())
            .field("active_transactions", &self.active_transactions())
            .finish()
    }
}
