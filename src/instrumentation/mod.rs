// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hooks through which library adapters report operation boundaries.
//!
//! Adapters do not patch the libraries they observe. They call these hooks
//! explicitly at the start and end of each operation:
//!
//! ```rust,ignore
//! use appmon::instrumentation::InstrumentationHooks;
//! use appmon::transaction::propagator;
//!
//! let txn = agent.on_inbound_start(request.uri().path());
//! propagator::scope(Some(txn.clone()), async {
//!     let segment = agent.on_outbound_start("localhost", "/status");
//!     let reply = client.get("http://localhost/status").await;
//!     agent.on_outbound_end(segment);
//! })
//! .await;
//! agent.on_inbound_end(&txn);
//! ```

mod hooks;
mod segment;

pub use hooks::{
    datastore_metric_name, external_metric_name, web_transaction_name, InstrumentationHooks,
    HTTP_DISPATCHER, HTTP_DISPATCHER_METRIC, WEB_TRANSACTION_PREFIX,
};
pub use segment::Segment;
