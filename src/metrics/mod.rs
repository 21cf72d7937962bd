// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics aggregation and rename mapping.
//!
//! - [`Statistics`]: call count and timing aggregate with in-place merge
//! - [`MetricStore`]: `(name, scope)` to metric, created at most once per key
//! - [`RenameRules`]: `(name, scope)` to compact ID for reporting
//! - [`report`]: rendering a harvested store for the collector

mod rename;
pub mod report;
mod stats;
mod store;

pub use rename::{RenameRule, RenameRules};
pub use report::{render, MetricData, MetricSpec};
pub use stats::Statistics;
pub use store::{Metric, MetricKey, MetricStore};
