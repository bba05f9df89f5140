//! Collection membership reconciliation
//!
//! Membership can be declared on either side: a collection lists its
//! `resources`, a resource lists its `in_collections`. Both directions are
//! folded into one adjacency map, cleaned once, and read back from both ends.

use crate::record::PreparedRecord;
use crate::report::NormalizeReport;
use std::collections::{BTreeMap, BTreeSet};

/// Reconciled membership
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    members: BTreeMap<String, BTreeSet<String>>,
    memberships: BTreeMap<String, BTreeSet<String>>,
}

impl Membership {
    /// Build membership for `records`; `blacklisted` IDs are known but hidden
    pub fn reconcile(
        records: &BTreeMap<String, PreparedRecord>,
        blacklisted: &BTreeSet<String>,
        report: &mut NormalizeReport,
    ) -> Self {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (id, prepared) in records {
            if prepared.is_collection() {
                adjacency
                    .entry(id.clone())
                    .or_default()
                    .extend(prepared.record.resources.iter().cloned());
            }
            for collection in &prepared.record.in_collections {
                adjacency
                    .entry(collection.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }

        let mut membership = Membership::default();
        for (collection, referenced) in adjacency {
            let defined = records
                .get(&collection)
                .map(PreparedRecord::is_collection)
                .unwrap_or(false);
            if !defined {
                report.warn(format!(
                    "Collection '{}' is not defined but was referenced by: {}. Removing it from these resources.",
                    collection,
                    referenced.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
                continue;
            }
            if blacklisted.contains(&collection) {
                continue;
            }

            let mut members = BTreeSet::new();
            for member in referenced {
                if !records.contains_key(&member) {
                    report.warn(format!(
                        "Collection '{}' lists unknown resource '{}'",
                        collection, member
                    ));
                    continue;
                }
                if blacklisted.contains(&member) || member == collection {
                    continue;
                }
                membership
                    .memberships
                    .entry(member.clone())
                    .or_default()
                    .insert(collection.clone());
                members.insert(member);
            }
            membership.members.insert(collection, members);
        }

        // collections nobody references still get an (empty) member list
        for (id, prepared) in records {
            if prepared.is_collection() && !blacklisted.contains(id) {
                membership.members.entry(id.clone()).or_default();
            }
        }

        membership
    }

    /// Sorted member IDs of a collection
    pub fn members_of(&self, collection: &str) -> Option<&BTreeSet<String>> {
        self.members.get(collection)
    }

    /// Sorted collection IDs a resource belongs to
    pub fn collections_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.memberships.get(id)
    }
}
