// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transactions and their propagation through asynchronous call chains.
//!
//! - [`Transaction`]: identity, scoped metrics, and the active/ended state
//! - [`propagator`]: which transaction the running chain belongs to
//!
//! # Usage
//!
//! ```rust,ignore
//! use appmon::transaction::propagator;
//!
//! let txn = agent.start_transaction();
//! propagator::scope(Some(txn.clone()), async {
//!     // Everything awaited here sees `txn` as current.
//!     let timer = propagator::spawn(async { /* so does this task */ });
//!     timer.await?;
//! })
//! .await;
//! txn.end();
//! ```

mod context;
mod id;
pub mod propagator;

pub use context::{RecordOutcome, Transaction, TransactionLifecycle};
pub use id::{TransactionId, TransactionIdExt};
pub use propagator::{bind, bind_fn, current, Bound, ContextPropagator};
