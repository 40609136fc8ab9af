//! Fair-share computation for duplicate groups
//!
//! For each group the members are split as evenly as possible across the
//! nodes that already host at least one member. Each node is allowed
//! `total / nodes` members and the first `total % nodes` nodes in ascending
//! name order are allowed one more, so allowances always sum to `total`.
//! Anything a node hosts beyond its allowance is excess.

use super::index::GroupIndex;
use super::key::GroupKey;
use serde::Serialize;
use std::collections::BTreeMap;

/// Allowance and excess of one group on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeShare {
    /// Members currently on the node
    pub actual: usize,
    /// Members the node may keep
    pub allowed: usize,
    /// `actual - allowed`, floored at zero
    pub excess: usize,
}

/// Fair split of one group across its hosting nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAllotment {
    pub total: usize,
    /// Keyed by node name, ascending
    pub nodes: BTreeMap<String, NodeShare>,
}

impl GroupAllotment {
    fn split(counts: BTreeMap<String, usize>) -> Self {
        let total: usize = counts.values().sum();
        let hosting = counts.len();

        if hosting == 0 {
            return Self {
                total: 0,
                nodes: BTreeMap::new(),
            };
        }

        let share = total / hosting;
        let remainder = total % hosting;

        let nodes = counts
            .into_iter()
            .enumerate()
            .map(|(position, (node, actual))| {
                let allowed = share + usize::from(position < remainder);
                let excess = actual.saturating_sub(allowed);
                (
                    node,
                    NodeShare {
                        actual,
                        allowed,
                        excess,
                    },
                )
            })
            .collect();

        Self { total, nodes }
    }

    /// Sum of allowances across nodes; equals `total`
    pub fn allowed_sum(&self) -> usize {
        self.nodes.values().map(|share| share.allowed).sum()
    }

    /// Sum of excess across nodes
    pub fn excess_sum(&self) -> usize {
        self.nodes.values().map(|share| share.excess).sum()
    }
}

/// Fair shares for every group in an index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FairnessPlan {
    groups: BTreeMap<GroupKey, GroupAllotment>,
}

impl FairnessPlan {
    /// Compute allotments for every group observed in the index
    pub fn compute(index: &GroupIndex) -> Self {
        let mut counts: BTreeMap<GroupKey, BTreeMap<String, usize>> = BTreeMap::new();

        for (node, key, bucket) in index.iter() {
            if bucket.is_empty() {
                continue;
            }
            counts
                .entry(key.clone())
                .or_default()
                .insert(node.to_string(), bucket.len());
        }

        let groups = counts
            .into_iter()
            .map(|(key, per_node)| (key, GroupAllotment::split(per_node)))
            .collect();

        Self { groups }
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupAllotment> {
        self.groups.get(key)
    }

    /// Groups in key order
    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &GroupAllotment)> {
        self.groups.iter()
    }

    pub fn share(&self, node: &str, key: &GroupKey) -> Option<NodeShare> {
        self.groups
            .get(key)
            .and_then(|group| group.nodes.get(node))
            .copied()
    }

    /// Excess of a group on a node; zero when the node hosts no members
    pub fn excess(&self, node: &str, key: &GroupKey) -> usize {
        self.share(node, key).map(|s| s.excess).unwrap_or(0)
    }

    /// Excess counts keyed by node then group
    pub fn excess_by_node(&self) -> BTreeMap<String, BTreeMap<GroupKey, usize>> {
        let mut by_node: BTreeMap<String, BTreeMap<GroupKey, usize>> = BTreeMap::new();
        for (key, group) in &self.groups {
            for (node, share) in &group.nodes {
                by_node
                    .entry(node.clone())
                    .or_default()
                    .insert(key.clone(), share.excess);
            }
        }
        by_node
    }

    /// Total excess across all groups and nodes
    pub fn total_excess(&self) -> usize {
        self.groups.values().map(GroupAllotment::excess_sum).sum()
    }
}
