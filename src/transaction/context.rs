// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-transaction state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::id::TransactionId;
use crate::error::MetricError;
use crate::metrics::{MetricStore, Statistics};

/// Callbacks a transaction invokes on its owner.
pub trait TransactionLifecycle: Send + Sync {
    /// Called exactly once, after the transaction has been marked ended.
    fn transaction_finished(&self, transaction: &Arc<Transaction>);

    /// Called for every sample rejected because the transaction had ended.
    fn sample_dropped(&self, transaction: &Transaction);

    /// Called when the last reference to a transaction that was never ended
    /// goes away, e.g. a handler bailing out early with `?`. The transaction
    /// is marked ended and its metrics are still readable.
    fn transaction_abandoned(&self, transaction: &Transaction);
}

struct Detached;

impl TransactionLifecycle for Detached {
    fn transaction_finished(&self, _transaction: &Arc<Transaction>) {}
    fn sample_dropped(&self, _transaction: &Transaction) {}
    fn transaction_abandoned(&self, _transaction: &Transaction) {}
}

/// Where a sample ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Recorded into a transaction's scoped metrics.
    Scoped,
    /// No transaction was active; recorded into the global store only.
    Global,
    /// The transaction had already ended; the sample was discarded.
    Dropped,
}

#[derive(Debug, Clone, Copy)]
struct Finish {
    at: DateTime<Utc>,
    duration: Duration,
}

/// One logical unit of work and the metrics attributed to it.
pub struct Transaction {
    id: TransactionId,
    name: RwLock<Option<String>>,
    metrics: MetricStore,
    // Held shared while recording so `end` cannot interleave with a write.
    ended: RwLock<bool>,
    started_at: DateTime<Utc>,
    start: Instant,
    finish: Mutex<Option<Finish>>,
    dropped: AtomicU64,
    lifecycle: Weak<dyn TransactionLifecycle>,
}

impl Transaction {
    pub(crate) fn new(lifecycle: Weak<dyn TransactionLifecycle>) -> Self {
        Self {
            id: TransactionId::new(),
            name: RwLock::new(None),
            metrics: MetricStore::new(),
            ended: RwLock::new(false),
            started_at: Utc::now(),
            start: Instant::now(),
            finish: Mutex::new(None),
            dropped: AtomicU64::new(0),
            lifecycle,
        }
    }

    /// A transaction with no owning agent. Ending it only marks it ended.
    pub fn detached() -> Self {
        Self::new(Weak::<Detached>::new())
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The label scoped metrics are filed under when the transaction ends.
    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = Some(name.into());
    }

    /// Metrics recorded against this transaction.
    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.read()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.finish.lock().map(|f| f.at)
    }

    /// Final duration once ended, elapsed time so far otherwise.
    pub fn duration(&self) -> Duration {
        match *self.finish.lock() {
            Some(finish) => finish.duration,
            None => self.start.elapsed(),
        }
    }

    /// Samples rejected after the transaction ended.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record one call, in seconds, against this transaction.
    ///
    /// Negative durations are rejected before the ended check, so an invalid
    /// sample is never counted as dropped.
    pub fn record(
        &self,
        name: &str,
        scope: Option<&str>,
        total: f64,
        exclusive: f64,
    ) -> Result<RecordOutcome, MetricError> {
        Statistics::validate(total, exclusive)?;

        let ended = self.ended.read();
        if *ended {
            drop(ended);
            self.drop_sample(name);
            return Ok(RecordOutcome::Dropped);
        }

        self.metrics.get_or_create(name, scope).record(total, exclusive)?;
        Ok(RecordOutcome::Scoped)
    }

    /// Record one call from durations.
    pub fn record_duration(
        &self,
        name: &str,
        scope: Option<&str>,
        total: Duration,
        exclusive: Duration,
    ) -> RecordOutcome {
        let ended = self.ended.read();
        if *ended {
            drop(ended);
            self.drop_sample(name);
            return RecordOutcome::Dropped;
        }

        self.metrics
            .get_or_create(name, scope)
            .record_duration(total, exclusive);
        RecordOutcome::Scoped
    }

    /// End the transaction.
    ///
    /// Only the first call has any effect; it returns `true`. Later calls
    /// return `false`.
    pub fn end(self: &Arc<Self>) -> bool {
        {
            let mut ended = self.ended.write();
            if *ended {
                return false;
            }
            *ended = true;
            *self.finish.lock() = Some(Finish {
                at: Utc::now(),
                duration: self.start.elapsed(),
            });
        }

        debug!(
            transaction = %self.id.short(),
            name = self.name().as_deref().unwrap_or("<unnamed>"),
            metrics = self.metrics.len(),
            "Transaction ended"
        );

        if let Some(lifecycle) = self.lifecycle.upgrade() {
            lifecycle.transaction_finished(self);
        }
        true
    }

    /// Fold this transaction's metrics into `global`.
    ///
    /// Every metric lands unscoped. It also lands scoped: under its own scope
    /// if it was recorded with one, otherwise under the transaction name.
    pub fn merge_into(&self, global: &MetricStore) {
        let label = self.name();
        for metric in self.metrics.iter() {
            let stats = metric.stats();
            global.get_or_create(metric.name(), None).merge(&stats);
            if let Some(scope) = metric.scope().or(label.as_deref()) {
                global.get_or_create(metric.name(), Some(scope)).merge(&stats);
            }
        }
    }

    fn drop_sample(&self, name: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        trace!(transaction = %self.id.short(), metric = name, "Dropped sample for ended transaction");
        if let Some(lifecycle) = self.lifecycle.upgrade() {
            lifecycle.sample_dropped(self);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let ended = self.ended.get_mut();
        if *ended {
            return;
        }
        *ended = true;
        *self.finish.get_mut() = Some(Finish {
            at: Utc::now(),
            duration: self.start.elapsed(),
        });

        if let Some(lifecycle) = self.lifecycle.upgrade() {
            lifecycle.transaction_abandoned(self);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("ended", &self.is_ended())
            .field("metrics", &self.metrics.len())
            .finish()
    }
}
