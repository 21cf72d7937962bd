// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Timing guard for one outbound operation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info_span, warn, Span};

use crate::agent::Agent;
use crate::metrics::Statistics;
use crate::transaction::{RecordOutcome, Transaction, TransactionIdExt};

/// An outbound call or data-store command in flight.
///
/// The transaction is captured when the segment starts, so the completion
/// path does not need to be bound to the originating chain. A segment whose
/// transaction ends before it finishes is dropped.
pub struct Segment {
    agent: Agent,
    metric_name: String,
    transaction: Option<Arc<Transaction>>,
    start: Instant,
    span: Span,
}

impl Segment {
    pub(crate) fn start(agent: &Agent, metric_name: String, transaction: Option<Arc<Transaction>>) -> Self {
        let span = info_span!(
            "segment",
            metric = %metric_name,
            transaction_id = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        if let Some(transaction) = &transaction {
            span.record_transaction_id(&transaction.id());
        }

        Self {
            agent: agent.clone(),
            metric_name,
            transaction,
            start: Instant::now(),
            span,
        }
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// The transaction this segment is attributed to.
    pub fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.transaction.as_ref()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish now, recording the elapsed time.
    pub fn finish(self) -> RecordOutcome {
        let elapsed = self.start.elapsed();
        self.finish_with(elapsed.as_secs_f64(), elapsed.as_secs_f64())
    }

    /// Finish with durations measured by the caller, in seconds.
    ///
    /// An invalid measurement is logged and dropped; it never reaches the
    /// caller as an error.
    pub fn finish_with(self, total: f64, exclusive: f64) -> RecordOutcome {
        let result = Statistics::validate(total, exclusive).and_then(|()| match &self.transaction {
            Some(transaction) => transaction.record(&self.metric_name, None, total, exclusive),
            None => self
                .agent
                .get_or_create_metric(&self.metric_name, None)
                .record(total, exclusive)
                .map(|()| RecordOutcome::Global),
        });

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(parent: &self.span, metric = %self.metric_name, error = %err, "Dropping invalid measurement");
                RecordOutcome::Dropped
            }
        };

        self.span.record("duration_ms", total * 1000.0);
        self.span.record("outcome", format!("{:?}", outcome).as_str());
        outcome
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("metric_name", &self.metric_name)
            .field("transaction", &self.transaction.as_ref().map(|t| t.id()))
            .field("elapsed", &self.elapsed())
            .finish()
    }
}
