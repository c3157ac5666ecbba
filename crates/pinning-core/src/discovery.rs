//! Run-scoped ledger of requested version references and their commits.
//!
//! Every pinnable reference found in any workflow registers its
//! `(identity, version)` pair here. The resolver then queries each identity
//! once for all of its pending versions and records the answers. Entries are
//! write-once: a resolved commit is never replaced within a run.

use crate::action::ActionIdentity;
use std::collections::BTreeMap;

/// Outcome of [`DiscoveryIndex::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// The pending entry now holds the commit.
    Resolved,
    /// The entry already held this exact commit.
    Unchanged,
    /// The entry already held a different commit, which was kept.
    Conflict { existing: String },
    /// The version was never registered for this identity; nothing stored.
    Unrequested,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryIndex {
    entries: BTreeMap<ActionIdentity, BTreeMap<String, Option<String>>>,
}

impl DiscoveryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair as unresolved. Returns `true` if it was not yet known.
    pub fn register(&mut self, identity: &ActionIdentity, version: &str) -> bool {
        let versions = self.entries.entry(identity.clone()).or_default();
        if versions.contains_key(version) {
            return false;
        }
        versions.insert(version.to_string(), None);
        true
    }

    /// Store the commit for a registered pair without overwriting a resolved one.
    pub fn record(&mut self, identity: &ActionIdentity, version: &str, commit: &str) -> Record {
        let Some(slot) = self
            .entries
            .get_mut(identity)
            .and_then(|versions| versions.get_mut(version))
        else {
            return Record::Unrequested;
        };

        if let Some(existing) = slot {
            return if existing.as_str() == commit {
                Record::Unchanged
            } else {
                Record::Conflict {
                    existing: existing.clone(),
                }
            };
        }
        *slot = Some(commit.to_string());
        Record::Resolved
    }

    pub fn lookup(&self, identity: &ActionIdentity, version: &str) -> Option<&str> {
        self.entries
            .get(identity)
            .and_then(|versions| versions.get(version))
            .and_then(|commit| commit.as_deref())
    }

    pub fn contains(&self, identity: &ActionIdentity, version: &str) -> bool {
        self.entries
            .get(identity)
            .is_some_and(|versions| versions.contains_key(version))
    }

    /// Identities with at least one unresolved version, each with the
    /// versions still waiting for a commit.
    pub fn pending(&self) -> Vec<(ActionIdentity, Vec<String>)> {
        self.entries
            .iter()
            .filter_map(|(identity, versions)| {
                let waiting: Vec<String> = versions
                    .iter()
                    .filter(|(_, commit)| commit.is_none())
                    .map(|(version, _)| version.clone())
                    .collect();
                (!waiting.is_empty()).then(|| (identity.clone(), waiting))
            })
            .collect()
    }

    /// All pairs that are still unresolved.
    pub fn unresolved(&self) -> impl Iterator<Item = (&ActionIdentity, &str)> {
        self.entries.iter().flat_map(|(identity, versions)| {
            versions
                .iter()
                .filter(|(_, commit)| commit.is_none())
                .map(move |(version, _)| (identity, version.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered `(identity, version)` pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn identity_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout() -> ActionIdentity {
        ActionIdentity::new("actions", "checkout")
    }

    #[test]
    fn register_is_idempotent() {
        let mut index = DiscoveryIndex::new();
        assert!(index.register(&checkout(), "v4"));
        assert!(!index.register(&checkout(), "v4"));
        assert!(index.register(&checkout(), "v3"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.identity_count(), 1);
    }

    #[test]
    fn record_fills_pending_entry() {
        let mut index = DiscoveryIndex::new();
        index.register(&checkout(), "v4");
        assert_eq!(index.lookup(&checkout(), "v4"), None);

        let sha = "a".repeat(40);
        assert_eq!(index.record(&checkout(), "v4", &sha), Record::Resolved);
        assert_eq!(index.lookup(&checkout(), "v4"), Some(sha.as_str()));
    }

    #[test]
    fn resolved_entry_is_never_overwritten() {
        let mut index = DiscoveryIndex::new();
        index.register(&checkout(), "v4");
        let first = "a".repeat(40);
        let second = "b".repeat(40);
        index.record(&checkout(), "v4", &first);

        assert_eq!(index.record(&checkout(), "v4", &first), Record::Unchanged);
        assert_eq!(
            index.record(&checkout(), "v4", &second),
            Record::Conflict {
                existing: first.clone()
            }
        );
        assert_eq!(index.lookup(&checkout(), "v4"), Some(first.as_str()));
    }

    #[test]
    fn unrequested_versions_are_not_added() {
        let mut index = DiscoveryIndex::new();
        index.register(&checkout(), "v4");
        assert_eq!(
            index.record(&checkout(), "nested/v4", &"c".repeat(40)),
            Record::Unrequested
        );
        assert!(!index.contains(&checkout(), "nested/v4"));
        assert_eq!(
            index.record(&ActionIdentity::new("other", "repo"), "v1", &"c".repeat(40)),
            Record::Unrequested
        );
        assert_eq!(index.identity_count(), 1);
    }

    #[test]
    fn pending_lists_only_unresolved_versions() {
        let mut index = DiscoveryIndex::new();
        let setup = ActionIdentity::new("owner", "setup");
        index.register(&checkout(), "v3");
        index.register(&checkout(), "v4");
        index.register(&setup, "v1");
        index.record(&setup, "v1", &"d".repeat(40));
        index.record(&checkout(), "v3", &"e".repeat(40));

        let pending = index.pending();
        assert_eq!(pending, vec![(checkout(), vec!["v4".to_string()])]);

        let unresolved: Vec<_> = index.unresolved().collect();
        assert_eq!(unresolved, vec![(&checkout(), "v4")]);
    }
}
