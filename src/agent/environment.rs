// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Declarative facts about the host process, reported alongside metrics.

use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Key for the component that originates transactions.
pub const DISPATCHER: &str = "Dispatcher";

/// Key for the web framework in use.
pub const FRAMEWORK: &str = "Framework";

/// Ordered key/value facts. Each key appears once; the last write wins and
/// keeps the key's original position.
#[derive(Debug, Default)]
pub struct Environment {
    entries: RwLock<Vec<(String, String)>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a fact.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    pub fn set_dispatcher(&self, name: impl Into<String>) {
        self.set(DISPATCHER, name);
    }

    pub fn set_framework(&self, name: impl Into<String>) {
        self.set(FRAMEWORK, name);
    }

    /// Snapshot of all facts in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.read().clone()
    }

    /// Facts as a JSON array of `[key, value]` pairs.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.entries
                .read()
                .iter()
                .map(|(key, value)| serde_json::json!([key, value]))
                .collect(),
        )
    }
}

impl Serialize for Environment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries = self.entries.read();
        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for (key, value) in entries.iter() {
            seq.serialize_element(&(key, value))?;
        }
        seq.end()
    }
}
