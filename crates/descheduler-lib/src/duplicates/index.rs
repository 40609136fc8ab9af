//! Per-node grouping of replicas by duplicate key

use super::key::{group_key, has_recognized_controller, GroupKey};
use crate::models::{NodeInfo, Replica, ReplicaId};
use std::collections::BTreeMap;

/// Members of one group on one node, ordered by replica name
pub type Bucket = Vec<Replica>;

/// Mapping of node -> group key -> bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    nodes: BTreeMap<String, BTreeMap<GroupKey, Bucket>>,
}

impl GroupIndex {
    /// Index a snapshot
    ///
    /// Replicas with an empty node are skipped. Repeated identities keep the
    /// last entry. Replicas without a recognized controller are only indexed
    /// when `include_ownerless` is set.
    pub fn build(nodes: &[NodeInfo], replicas: &[Replica], include_ownerless: bool) -> Self {
        let mut latest: BTreeMap<&ReplicaId, &Replica> = BTreeMap::new();
        for replica in replicas {
            latest.insert(&replica.id, replica);
        }

        let mut index: BTreeMap<String, BTreeMap<GroupKey, Bucket>> = nodes
            .iter()
            .map(|node| (node.name.clone(), BTreeMap::new()))
            .collect();

        for replica in latest.into_values() {
            if !replica.is_scheduled() {
                continue;
            }
            if !include_ownerless && !has_recognized_controller(replica) {
                continue;
            }

            index
                .entry(replica.node_name.clone())
                .or_default()
                .entry(group_key(replica))
                .or_default()
                .push(replica.clone());
        }

        for bucket in index.values_mut().flat_map(|groups| groups.values_mut()) {
            bucket.sort_by(|a, b| {
                a.name()
                    .cmp(b.name())
                    .then_with(|| a.namespace().cmp(b.namespace()))
            });
        }

        Self { nodes: index }
    }

    /// Node names in ascending order, including nodes without members
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Groups hosted on a node
    pub fn groups_on(&self, node: &str) -> Option<&BTreeMap<GroupKey, Bucket>> {
        self.nodes.get(node)
    }

    /// Members of a group on a node; empty if none
    pub fn members(&self, node: &str, key: &GroupKey) -> &[Replica] {
        self.nodes
            .get(node)
            .and_then(|groups| groups.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every (node, key, bucket) triple in node then key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupKey, &[Replica])> {
        self.nodes.iter().flat_map(|(node, groups)| {
            groups
                .iter()
                .map(move |(key, bucket)| (node.as_str(), key, bucket.as_slice()))
        })
    }

    /// Total number of indexed replicas
    pub fn replica_count(&self) -> usize {
        self.iter().map(|(_, _, bucket)| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.replica_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OwnerReference;

    fn pod(name: &str, node: &str) -> Replica {
        Replica::new("default", name)
            .on_node(node)
            .owned_by(OwnerReference::controller("ReplicaSet", "rs-1"))
            .with_image("nginx:1.0")
    }

    #[test]
    fn test_buckets_by_node_and_key() {
        let replicas = vec![pod("p1", "a"), pod("p2", "a"), pod("p3", "b")];
        let index = GroupIndex::build(&[], &replicas, false);

        let key = group_key(&replicas[0]);
        assert_eq!(index.members("a", &key).len(), 2);
        assert_eq!(index.members("b", &key).len(), 1);
        assert_eq!(index.replica_count(), 3);
    }

    #[test]
    fn test_unscheduled_replicas_excluded() {
        let replicas = vec![pod("p1", "a"), pod("p2", "")];
        let index = GroupIndex::build(&[], &replicas, false);

        assert_eq!(index.replica_count(), 1);
        assert_eq!(index.node_names().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_bucket_ordered_by_name() {
        let replicas = vec![pod("p3", "a"), pod("p1", "a"), pod("p2", "a")];
        let index = GroupIndex::build(&[], &replicas, false);

        let names: Vec<_> = index
            .members("a", &group_key(&replicas[0]))
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_duplicate_identity_last_seen_wins() {
        let replicas = vec![pod("p1", "a"), pod("p1", "b")];
        let index = GroupIndex::build(&[], &replicas, false);

        let key = group_key(&replicas[0]);
        assert_eq!(index.replica_count(), 1);
        assert!(index.members("a", &key).is_empty());
        assert_eq!(index.members("b", &key).len(), 1);
    }

    #[test]
    fn test_ownerless_excluded_by_default() {
        let ownerless = Replica::new("default", "bare").on_node("a").with_image("nginx");
        let replicas = vec![pod("p1", "a"), ownerless];

        let index = GroupIndex::build(&[], &replicas, false);
        assert_eq!(index.replica_count(), 1);

        let index = GroupIndex::build(&[], &replicas, true);
        assert_eq!(index.replica_count(), 2);
    }

    #[test]
    fn test_empty_nodes_listed() {
        let nodes = vec![NodeInfo::new("idle"), NodeInfo::new("a")];
        let index = GroupIndex::build(&nodes, &[pod("p1", "a")], false);

        assert_eq!(index.node_names().collect::<Vec<_>>(), vec!["a", "idle"]);
        assert!(index.groups_on("idle").unwrap().is_empty());
    }
}
