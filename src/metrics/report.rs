// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Conversion of harvested metrics into the collector's reporting shape.

use serde::ser::{Serialize, SerializeTuple, Serializer};

use super::rename::RenameRules;
use super::stats::Statistics;
use super::store::{MetricKey, MetricStore};

/// How a reported metric is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSpec {
    /// Compact ID assigned by a rename rule.
    Id(u64),
    /// Literal name and scope.
    Literal(MetricKey),
}

impl Serialize for MetricSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Id(id) => serializer.serialize_u64(*id),
            Self::Literal(key) => key.serialize(serializer),
        }
    }
}

/// One metric ready for transmission.
///
/// Serializes as `[spec, [callCount, total, totalExclusive, min, max, sumOfSquares]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricData {
    pub spec: MetricSpec,
    pub stats: Statistics,
}

impl Serialize for MetricData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.spec)?;
        tuple.serialize_element(&self.stats)?;
        tuple.end()
    }
}

/// Render every metric in `store`, substituting IDs where `rules` has one.
pub fn render(store: &MetricStore, rules: &RenameRules) -> Vec<MetricData> {
    store
        .iter()
        .map(|metric| {
            let spec = match rules.lookup(metric.name(), metric.scope()) {
                Some(id) => MetricSpec::Id(id),
                None => MetricSpec::Literal(metric.key().clone()),
            };
            MetricData {
                spec,
                stats: metric.stats(),
            }
        })
        .collect()
}
