// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metric rename rules.
//!
//! The collector hands out compact numeric IDs for metrics it has already
//! seen. Reported metrics whose `(name, scope)` has an ID are sent by ID;
//! everything else goes out under its literal name and scope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::store::MetricKey;

/// One `[ {name, scope?}, id ]` pair as delivered by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule(pub MetricKey, pub u64);

impl RenameRule {
    pub fn new(spec: MetricKey, id: u64) -> Self {
        Self(spec, id)
    }

    pub fn spec(&self) -> &MetricKey {
        &self.0
    }

    pub fn id(&self) -> u64 {
        self.1
    }
}

/// Lookup table from metric key to compact ID.
///
/// Scoped and unscoped names live in disjoint tables: an unscoped lookup never
/// sees a scoped rule and the other way round.
#[derive(Debug, Clone, Default)]
pub struct RenameRules {
    unscoped: HashMap<String, u64>,
    scoped: HashMap<String, HashMap<String, u64>>,
    len: usize,
}

impl RenameRules {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an ordered rule list.
    pub fn from_rules(rules: &[RenameRule]) -> Self {
        let mut table = Self::new();
        table.parse(rules);
        table
    }

    /// Add rules to the table. Later duplicates overwrite the ID.
    pub fn parse(&mut self, rules: &[RenameRule]) {
        for RenameRule(spec, id) in rules {
            let table = self.resolve_scope(spec.scope.as_deref());
            if table.insert(spec.name.clone(), *id).is_none() {
                self.len += 1;
            }
            trace!(spec = %spec, id, "Metric spec mapped to ID");
        }
        debug!(parsed = rules.len(), total = self.len, "Parsed metric IDs");
    }

    /// Parse the collector's JSON rule list.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let rules: Vec<RenameRule> = serde_json::from_str(json)?;
        Ok(Self::from_rules(&rules))
    }

    /// Find the ID for `(name, scope)`.
    pub fn lookup(&self, name: &str, scope: Option<&str>) -> Option<u64> {
        match scope {
            Some(scope) => self.scoped.get(scope)?.get(name).copied(),
            None => self.unscoped.get(name).copied(),
        }
    }

    /// Number of distinct specs mapped.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn resolve_scope(&mut self, scope: Option<&str>) -> &mut HashMap<String, u64> {
        match scope {
            Some(scope) => self.scoped.entry(scope.to_string()).or_default(),
            None => &mut self.unscoped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(name: &str, scope: Option<&str>, id: u64) -> RenameRule {
        RenameRule::new(MetricKey::new(name, scope), id)
    }

    #[test]
    fn test_empty_table() {
        let rules = RenameRules::new();
        assert!(rules.is_empty());
        assert_eq!(rules.lookup("Anything", None), None);
    }

    #[test]
    fn test_lookup_unscoped_and_scoped() {
        let rules = RenameRules::from_rules(&[
            rule("Test/RenameMe1", None, 1001),
            rule("Test/RenameMe2", Some("TEST"), 1002),
        ]);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.lookup("Test/RenameMe1", None), Some(1001));
        assert_eq!(rules.lookup("Test/RenameMe2", Some("TEST")), Some(1002));
    }

    #[test]
    fn test_scoped_and_unscoped_are_disjoint() {
        let rules = RenameRules::from_rules(&[
            rule("Unscoped", None, 1),
            rule("Scoped", Some("TEST"), 2),
        ]);

        assert_eq!(rules.lookup("Scoped", None), None);
        assert_eq!(rules.lookup("Unscoped", Some("TEST")), None);
        assert_eq!(rules.lookup("Scoped", Some("OTHER")), None);
    }

    #[test]
    fn test_duplicates_overwrite_without_counting() {
        let rules = RenameRules::from_rules(&[
            rule("Test/Dup", None, 1),
            rule("Test/Dup", None, 2),
            rule("Test/Dup", Some("scope"), 3),
        ]);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.lookup("Test/Dup", None), Some(2));
        assert_eq!(rules.lookup("Test/Dup", Some("scope")), Some(3));
    }

    #[test]
    fn test_empty_scope_is_a_scope() {
        let rules = RenameRules::from_rules(&[rule("Name", Some(""), 7)]);
        assert_eq!(rules.lookup("Name", Some("")), Some(7));
        assert_eq!(rules.lookup("Name", None), None);
    }

    #[test]
    fn test_parse_accumulates() {
        let mut rules = RenameRules::from_rules(&[rule("a", None, 1)]);
        rules.parse(&[rule("b", None, 2), rule("a", None, 3)]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.lookup("a", None), Some(3));
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            [{"name": "WebTransaction"}, 1],
            [{"name": "External/localhost/http", "scope": "WebTransaction/Uri/path"}, 2]
        ]"#;
        let rules = RenameRules::from_json(json).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.lookup("WebTransaction", None), Some(1));
        assert_eq!(
            rules.lookup("External/localhost/http", Some("WebTransaction/Uri/path")),
            Some(2)
        );
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(RenameRules::from_json(r#"[{"name": "a"}]"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_every_inserted_rule_is_found(
            entries in prop::collection::hash_map(("[a-e]{1,3}", prop::option::of("[s-u]")), any::<u64>(), 0..32)
        ) {
            let rules: Vec<RenameRule> = entries
                .iter()
                .map(|((name, scope), id)| rule(name, scope.as_deref(), *id))
                .collect();
            let table = RenameRules::from_rules(&rules);

            prop_assert_eq!(table.len(), entries.len());
            for ((name, scope), id) in &entries {
                prop_assert_eq!(table.lookup(name, scope.as_deref()), Some(*id));
            }
        }
    }
}
