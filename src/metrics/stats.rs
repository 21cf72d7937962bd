// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Call-count and timing aggregate for a single metric.

use std::time::Duration;

use serde::ser::{Serialize, SerializeTuple, Serializer};

use crate::error::MetricError;

/// Aggregated timing statistics.
///
/// Durations are stored as seconds. An empty aggregate has every field at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    /// Number of recorded calls.
    pub call_count: u64,

    /// Sum of total durations.
    pub total: f64,

    /// Sum of exclusive durations.
    pub total_exclusive: f64,

    /// Smallest total duration seen.
    pub min: f64,

    /// Largest total duration seen.
    pub max: f64,

    /// Sum of squared total durations.
    pub sum_of_squares: f64,
}

impl Statistics {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call, in seconds.
    ///
    /// Rejects negative and non-finite values without touching the aggregate.
    pub fn record(&mut self, total: f64, exclusive: f64) -> Result<(), MetricError> {
        Self::validate(total, exclusive)?;

        if self.call_count == 0 {
            self.min = total;
            self.max = total;
        } else {
            self.min = self.min.min(total);
            self.max = self.max.max(total);
        }

        self.call_count += 1;
        self.total += total;
        self.total_exclusive += exclusive;
        self.sum_of_squares += total * total;
        Ok(())
    }

    /// Check a measurement without recording it.
    pub fn validate(total: f64, exclusive: f64) -> Result<(), MetricError> {
        check("total", total)?;
        check("exclusive", exclusive)
    }

    /// Record one call from durations. Cannot fail.
    pub fn record_duration(&mut self, total: Duration, exclusive: Duration) {
        // Durations are never negative and always finite.
        let _ = self.record(total.as_secs_f64(), exclusive.as_secs_f64());
    }

    /// Fold another aggregate into this one.
    pub fn merge(&mut self, other: &Statistics) {
        if other.call_count == 0 {
            return;
        }
        if self.call_count == 0 {
            *self = *other;
            return;
        }

        self.call_count += other.call_count;
        self.total += other.total;
        self.total_exclusive += other.total_exclusive;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum_of_squares += other.sum_of_squares;
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.call_count == 0
    }

    /// Mean total duration in seconds.
    pub fn mean(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total / self.call_count as f64
        }
    }
}

fn check(field: &'static str, value: f64) -> Result<(), MetricError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MetricError::invalid(field, value))
    }
}

/// Serializes as `[callCount, total, totalExclusive, min, max, sumOfSquares]`.
impl Serialize for Statistics {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tuple = serializer.serialize_tuple(6)?;
        tuple.serialize_element(&self.call_count)?;
        tuple.serialize_element(&self.total)?;
        tuple.serialize_element(&self.total_exclusive)?;
        tuple.serialize_element(&self.min)?;
        tuple.serialize_element(&self.max)?;
        tuple.serialize_element(&self.sum_of_squares)?;
        tuple.end()
    }
}
