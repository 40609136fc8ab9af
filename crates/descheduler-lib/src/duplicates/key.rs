//! Duplicate-group key extraction
//!
//! Two replicas are duplicates when they share a controller, a namespace and
//! the image of their first declared container.

use crate::models::{Replica, ReplicaId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Controller kinds whose replicas are interchangeable
const RECOGNIZED_CONTROLLER_KINDS: &[&str] = &[
    "ReplicaSet",
    "ReplicationController",
    "StatefulSet",
    "DaemonSet",
    "Job",
];

/// Deterministic duplicate-classification key
///
/// Ownerless replicas get a [`GroupKey::Unique`] key so they can never equal
/// a controller-derived key or another replica's key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// `namespace/kind/name/primary-image`
    Owned(String),
    /// Keyed by the replica's own identity
    Unique(ReplicaId),
}

impl GroupKey {
    /// Whether this key can group more than one replica
    pub fn is_shared(&self) -> bool {
        matches!(self, GroupKey::Owned(_))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Owned(key) => f.write_str(key),
            GroupKey::Unique(id) => write!(f, "{}", id),
        }
    }
}

/// Derive the group key for a replica
///
/// Only the first container's image participates. Replicas of the same
/// controller running different first images fall into different groups.
pub fn group_key(replica: &Replica) -> GroupKey {
    match recognized_controller(replica) {
        Some((kind, name)) => {
            let primary_image = replica.images.first().map(String::as_str).unwrap_or("");
            GroupKey::Owned(format!(
                "{}/{}/{}/{}",
                replica.namespace(),
                kind,
                name,
                primary_image
            ))
        }
        None => GroupKey::Unique(replica.id.clone()),
    }
}

/// Returns true if the replica has a controller this strategy groups by
pub fn has_recognized_controller(replica: &Replica) -> bool {
    recognized_controller(replica).is_some()
}

fn recognized_controller(replica: &Replica) -> Option<(&str, &str)> {
    replica
        .controller()
        .filter(|owner| RECOGNIZED_CONTROLLER_KINDS.contains(&owner.kind.as_str()))
        .map(|owner| (owner.kind.as_str(), owner.name.as_str()))
}
