// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Named, optionally scoped metric storage.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::stats::Statistics;
use crate::error::MetricError;

/// Identifies a metric by name and optional scope.
///
/// An absent scope is distinct from every scope value, the empty string included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl MetricKey {
    /// Create a key.
    pub fn new(name: impl Into<String>, scope: Option<&str>) -> Self {
        Self {
            name: name.into(),
            scope: scope.map(str::to_string),
        }
    }

    /// Create an unscoped key.
    pub fn unscoped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
        }
    }

    /// Create a key under `scope`.
    pub fn scoped(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Some(scope.into()),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{} [{}]", self.name, scope),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A single metric: its key and a shared aggregate.
///
/// Handed out by [`MetricStore::get_or_create`]; every caller asking for the
/// same key gets the same `Arc<Metric>` and records into it directly.
///
/// Once its store has been taken for harvest the metric is retired: its
/// aggregate is frozen and later writes go to the same key of the store it
/// was taken from.
#[derive(Debug)]
pub struct Metric {
    key: MetricKey,
    state: Mutex<MetricState>,
    home: Weak<Mutex<StoreInner>>,
}

#[derive(Debug, Default)]
struct MetricState {
    stats: Statistics,
    retired: bool,
}

impl Metric {
    fn new(key: MetricKey, home: Weak<Mutex<StoreInner>>) -> Self {
        Self {
            key,
            state: Mutex::new(MetricState::default()),
            home,
        }
    }

    pub fn key(&self) -> &MetricKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn scope(&self) -> Option<&str> {
        self.key.scope.as_deref()
    }

    /// Record one call, in seconds.
    pub fn record(&self, total: f64, exclusive: f64) -> Result<(), MetricError> {
        self.update(|stats| stats.record(total, exclusive))
    }

    /// Record one call from durations.
    pub fn record_duration(&self, total: Duration, exclusive: Duration) {
        self.update(|stats| stats.record_duration(total, exclusive));
    }

    /// Fold an aggregate into this metric.
    pub fn merge(&self, other: &Statistics) {
        self.update(|stats| stats.merge(other));
    }

    /// Copy of the current aggregate.
    pub fn stats(&self) -> Statistics {
        self.state.lock().stats
    }

    /// Whether the metric's store has been taken since it was handed out.
    pub fn is_retired(&self) -> bool {
        self.state.lock().retired
    }

    fn update<R>(&self, f: impl FnOnce(&mut Statistics) -> R) -> R {
        {
            let mut state = self.state.lock();
            if !state.retired {
                return f(&mut state.stats);
            }
        }

        // The metric lock is released before the store lock is taken.
        match self.home.upgrade() {
            Some(home) => entry(&home, &self.key).update(f),
            None => {
                trace!(metric = %self.key, "Store gone, discarding write to retired metric");
                f(&mut Statistics::new())
            }
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    index: HashMap<MetricKey, usize>,
    entries: Vec<Arc<Metric>>,
}

fn entry(inner: &Arc<Mutex<StoreInner>>, key: &MetricKey) -> Arc<Metric> {
    let mut guard = inner.lock();

    if let Some(&idx) = guard.index.get(key) {
        return Arc::clone(&guard.entries[idx]);
    }

    let metric = Arc::new(Metric::new(key.clone(), Arc::downgrade(inner)));
    let idx = guard.entries.len();
    guard.entries.push(Arc::clone(&metric));
    guard.index.insert(key.clone(), idx);
    metric
}

/// Mapping from [`MetricKey`] to metric, in insertion order.
#[derive(Debug, Default)]
pub struct MetricStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MetricStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the metric for `(name, scope)`, creating it on first access.
    pub fn get_or_create(&self, name: &str, scope: Option<&str>) -> Arc<Metric> {
        entry(&self.inner, &MetricKey::new(name, scope))
    }

    /// Look up a metric without creating it.
    pub fn get_existing(&self, name: &str, scope: Option<&str>) -> Option<Arc<Metric>> {
        let key = MetricKey::new(name, scope);
        let inner = self.inner.lock();
        inner.index.get(&key).map(|&idx| Arc::clone(&inner.entries[idx]))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerate all metrics in insertion order.
    ///
    /// The set of metrics is fixed when the call is made; statistics are read
    /// as the iterator advances.
    pub fn iter(&self) -> impl Iterator<Item = Arc<Metric>> {
        self.inner.lock().entries.clone().into_iter()
    }

    /// Visit every `(key, stats)` pair in insertion order.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&MetricKey, &Statistics),
    {
        for metric in self.iter() {
            visitor(metric.key(), &metric.stats());
        }
    }

    /// Merge every metric of this store into the same key of `other`.
    pub fn merge_into(&self, other: &MetricStore) {
        for metric in self.iter() {
            other
                .get_or_create(metric.name(), metric.scope())
                .merge(&metric.stats());
        }
    }

    /// Swap the contents out, leaving this store empty.
    ///
    /// Every write lands either in the returned store or in this one: a
    /// write that finishes before a metric is retired is part of the returned
    /// snapshot, and handles obtained before the swap forward later writes
    /// back here.
    pub fn take(&self) -> MetricStore {
        let mut inner = self.inner.lock();
        for metric in &inner.entries {
            metric.state.lock().retired = true;
        }
        let taken = std::mem::take(&mut *inner);
        drop(inner);

        MetricStore {
            inner: Arc::new(Mutex::new(taken)),
        }
    }
}
