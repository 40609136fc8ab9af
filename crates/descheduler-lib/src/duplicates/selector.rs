//! Eviction candidate selection

use super::fairness::NodeShare;
use super::key::GroupKey;
use crate::models::Replica;
use crate::policy::EligibilityPredicate;
use serde::Serialize;

/// Why a replica was chosen for eviction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionReason {
    pub group: GroupKey,
    pub node: String,
    /// Members of the group on the node
    pub on_node: usize,
    /// Members the node may keep
    pub allowed: usize,
    /// Members over the allowance
    pub excess: usize,
}

/// A replica selected for eviction in this pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictionCandidate {
    pub replica: Replica,
    pub reason: SelectionReason,
}

impl EvictionCandidate {
    pub fn node(&self) -> &str {
        &self.reason.node
    }
}

/// Pick up to `share.excess` eligible members, in bucket order
///
/// Ineligible members are skipped. When fewer eligible members exist than the
/// excess, the eligible subset is returned.
pub fn select<P>(
    node: &str,
    key: &GroupKey,
    share: NodeShare,
    members: &[Replica],
    predicate: &P,
) -> Vec<EvictionCandidate>
where
    P: EligibilityPredicate + ?Sized,
{
    if share.excess == 0 {
        return Vec::new();
    }

    members
        .iter()
        .filter(|replica| predicate.eligible(replica))
        .take(share.excess)
        .map(|replica| EvictionCandidate {
            replica: replica.clone(),
            reason: SelectionReason {
                group: key.clone(),
                node: node.to_string(),
                on_node: share.actual,
                allowed: share.allowed,
                excess: share.excess,
            },
        })
        .collect()
}
