// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Operation-boundary hooks called by library adapters.

use std::sync::Arc;

use tracing::debug;

use super::segment::Segment;
use crate::agent::Agent;
use crate::transaction::{propagator, RecordOutcome, Transaction};

/// Prefix of inbound web transaction names.
pub const WEB_TRANSACTION_PREFIX: &str = "WebTransaction/Uri";

/// Unscoped rollup recorded once per inbound HTTP request.
pub const HTTP_DISPATCHER_METRIC: &str = "HttpDispatcher";

/// Dispatcher name reported for the built-in HTTP server adapter.
pub const HTTP_DISPATCHER: &str = "http";

/// What an adapter reports at the edges of the operations it observes.
pub trait InstrumentationHooks {
    /// An inbound request arrived. Returns its new transaction; the adapter
    /// runs the request handler under [`propagator::scope`] with it.
    fn on_inbound_start(&self, uri_path: &str) -> Arc<Transaction>;

    /// The response for an inbound request has been sent.
    fn on_inbound_end(&self, transaction: &Arc<Transaction>);

    /// An outbound HTTP request is being issued to `host`.
    fn on_outbound_start(&self, host: &str, path: &str) -> Segment;

    /// A data-store command is being issued.
    fn on_datastore_start(&self, product: &str, operation: &str) -> Segment;

    /// The reply to an outbound request or command arrived.
    fn on_outbound_end(&self, segment: Segment) -> RecordOutcome {
        segment.finish()
    }
}

/// Name of the web transaction for `uri_path`.
pub fn web_transaction_name(uri_path: &str) -> String {
    let path = uri_path.split('?').next().unwrap_or_default();
    if path.starts_with('/') {
        format!("{}{}", WEB_TRANSACTION_PREFIX, path)
    } else {
        format!("{}/{}", WEB_TRANSACTION_PREFIX, path)
    }
}

/// Metric name for an outbound HTTP call.
pub fn external_metric_name(host: &str) -> String {
    format!("External/{}/http", host)
}

/// Metric name for a data-store command.
pub fn datastore_metric_name(product: &str, operation: &str) -> String {
    format!("{}/{}", product, operation.to_lowercase())
}

impl InstrumentationHooks for Agent {
    fn on_inbound_start(&self, uri_path: &str) -> Arc<Transaction> {
        self.environment().set_dispatcher(HTTP_DISPATCHER);
        let transaction = self.start_transaction();
        transaction.set_name(web_transaction_name(uri_path));
        transaction
    }

    fn on_inbound_end(&self, transaction: &Arc<Transaction>) {
        if !transaction.end() {
            debug!(transaction = %transaction.id().short(), "Inbound request already ended");
            return;
        }

        let duration = transaction.duration();
        if let Some(name) = transaction.name() {
            self.get_or_create_metric(&name, None)
                .record_duration(duration, duration);
        }
        self.get_or_create_metric(HTTP_DISPATCHER_METRIC, None)
            .record_duration(duration, duration);
    }

    fn on_outbound_start(&self, host: &str, path: &str) -> Segment {
        let segment = Segment::start(self, external_metric_name(host), propagator::current());
        segment.span().in_scope(|| debug!(host, path, "Outbound request started"));
        segment
    }

    fn on_datastore_start(&self, product: &str, operation: &str) -> Segment {
        Segment::start(
            self,
            datastore_metric_name(product, operation),
            propagator::current(),
        )
    }
}
