// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! appmon - in-process telemetry core for an APM agent.
//!
//! Attributes timing measurements of outbound calls and data-store commands
//! to the inbound request (transaction) that caused them, even when the work
//! hops across `.await` points, callbacks and spawned tasks.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`metrics`] - Statistics, the keyed metric store, rename rules and report rendering
//! - [`transaction`] - Transactions and the task-local context propagator
//! - [`agent`] - The agent facade, global metrics and environment facts
//! - [`instrumentation`] - Hooks adapters call at operation boundaries
//! - [`harvest`] - Periodic hand-off of metrics to a sink
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Logging setup for the agent itself
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use appmon::config::{load_config, Overrides};
//! use appmon::instrumentation::InstrumentationHooks;
//! use appmon::Agent;
//!
//! let config = load_config(&cwd, Overrides::from_env())?;
//! let agent = Agent::with_config(&config);
//!
//! let txn = agent.on_inbound_start("/path");
//! appmon::transaction::propagator::scope(Some(txn.clone()), handle_request()).await;
//! agent.on_inbound_end(&txn);
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod harvest;
pub mod instrumentation;
pub mod metrics;
pub mod telemetry;
pub mod transaction;

// Re-export commonly used types at crate root
pub use agent::{Agent, Environment};
pub use error::{ConfigError, HarvestError, MetricError, Result};
pub use harvest::{HarvestHandle, HarvestPayload, Harvester, MetricSink};
pub use instrumentation::{InstrumentationHooks, Segment};
pub use metrics::{Metric, MetricKey, MetricStore, RenameRule, RenameRules, Statistics};
pub use transaction::{RecordOutcome, Transaction, TransactionId};

/// appmon version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
