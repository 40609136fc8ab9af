//! Remove-duplicates strategy
//!
//! Finds replicas of the same workload (same controller, namespace and
//! primary image) that are piled up on one node relative to how the group is
//! spread across the cluster, and selects the excess for eviction:
//! - [`key`]: duplicate-group key extraction
//! - [`index`]: per-node grouping of a snapshot
//! - [`fairness`]: fair-share and excess computation
//! - [`selector`]: eligibility-filtered candidate selection
//!
//! Planning is a pure function of the snapshot, the configuration and the
//! eligibility predicate.

pub mod fairness;
pub mod index;
pub mod key;
pub mod selector;


pub use fairness::{FairnessPlan, GroupAllotment, NodeShare};
pub use index::{Bucket, GroupIndex};
pub use key::{group_key, GroupKey};
pub use selector::{select, EvictionCandidate, SelectionReason};

use crate::config::StrategyConfig;
use crate::models::ClusterSnapshot;
use crate::policy::EligibilityPredicate;
use serde::Serialize;

/// Plan for one group on one node that has excess
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlan {
    pub group: GroupKey,
    /// Members of the group across the cluster
    pub total: usize,
    pub share: NodeShare,
    pub selected: Vec<EvictionCandidate>,
    /// Excess left in place because not enough members were eligible
    pub unselected: usize,
}

/// Excess groups on one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePlan {
    pub node: String,
    pub groups: Vec<GroupPlan>,
}

impl NodePlan {
    pub fn selected_count(&self) -> usize {
        self.groups.iter().map(|g| g.selected.len()).sum()
    }

    pub fn unselected_count(&self) -> usize {
        self.groups.iter().map(|g| g.unselected).sum()
    }
}

/// Output of one planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicatePlan {
    /// Nodes with excess, ascending by name
    pub nodes: Vec<NodePlan>,
    /// Distinct groups seen in the snapshot
    pub groups_observed: usize,
    /// Replicas that entered the index
    pub replicas_indexed: usize,
}

impl DuplicatePlan {
    /// Selected candidates in node order, then group order, then bucket order
    pub fn candidates(&self) -> Vec<EvictionCandidate> {
        self.nodes
            .iter()
            .flat_map(|node| node.groups.iter())
            .flat_map(|group| group.selected.iter().cloned())
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.nodes.iter().map(NodePlan::selected_count).sum()
    }

    pub fn unselected_count(&self) -> usize {
        self.nodes.iter().map(NodePlan::unselected_count).sum()
    }

    pub fn total_excess(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|node| node.groups.iter())
            .map(|group| group.share.excess)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The remove-duplicates planning strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveDuplicates {
    include_ownerless: bool,
}

impl RemoveDuplicates {
    pub fn new(include_ownerless: bool) -> Self {
        Self { include_ownerless }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.include_ownerless)
    }

    /// Index the snapshot
    pub fn index(&self, snapshot: &ClusterSnapshot) -> GroupIndex {
        GroupIndex::build(&snapshot.nodes, &snapshot.replicas, self.include_ownerless)
    }

    /// Compute the eviction plan for a snapshot
    pub fn plan<P>(&self, snapshot: &ClusterSnapshot, predicate: &P) -> DuplicatePlan
    where
        P: EligibilityPredicate + ?Sized,
    {
        let index = self.index(snapshot);
        let fairness = FairnessPlan::compute(&index);

        let mut nodes = Vec::new();
        for node in index.node_names() {
            let Some(groups) = index.groups_on(node) else {
                continue;
            };

            let mut group_plans = Vec::new();
            for (key, bucket) in groups {
                let Some(share) = fairness.share(node, key) else {
                    continue;
                };
                if share.excess == 0 {
                    continue;
                }

                let selected = select(node, key, share, bucket, predicate);
                let total = fairness.group(key).map(|g| g.total).unwrap_or(0);
                group_plans.push(GroupPlan {
                    group: key.clone(),
                    total,
                    share,
                    unselected: share.excess - selected.len(),
                    selected,
                });
            }

            if !group_plans.is_empty() {
                nodes.push(NodePlan {
                    node: node.to_string(),
                    groups: group_plans,
                });
            }
        }

        DuplicatePlan {
            nodes,
            groups_observed: fairness.groups().count(),
            replicas_indexed: index.replica_count(),
        }
    }
}
