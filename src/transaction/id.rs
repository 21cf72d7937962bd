// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transaction identifiers.

use std::fmt;
use uuid::Uuid;

/// Process-unique identifier of a transaction.
///
/// Also recorded on tracing spans so log lines emitted from deep inside a
/// callback chain can be tied back to the inbound request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a new random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First 8 hex characters, for log output.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.short())
    }
}

impl From<Uuid> for TransactionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl serde::Serialize for TransactionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Extension trait for tagging tracing spans with a transaction.
pub trait TransactionIdExt {
    /// Record the ID in the span's `transaction_id` field.
    fn record_transaction_id(&self, id: &TransactionId);
}

impl TransactionIdExt for tracing::Span {
    fn record_transaction_id(&self, id: &TransactionId) {
        self.record("transaction_id", id.to_string().as_str());
    }
}
