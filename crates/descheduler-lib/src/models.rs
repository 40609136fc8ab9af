//! Core data models for the descheduler
//!
//! These are read-only views over a cluster snapshot. They are produced by a
//! [`SnapshotSource`](crate::snapshot::SnapshotSource) and never mutated
//! during a planning pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespaced identity of a replica
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId {
    pub namespace: String,
    pub name: String,
}

impl ReplicaId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reference to an object that owns a replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    /// Set when this reference is the managing controller
    #[serde(default)]
    pub controller: bool,
}

impl OwnerReference {
    /// Build a controller owner reference
    pub fn controller(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            controller: true,
        }
    }
}

/// Protection flags reported by the snapshot source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionFlags {
    /// Uses emptyDir/hostPath volumes that are lost on eviction
    pub local_storage: bool,
    /// Static pod mirrored by the kubelet
    pub mirror: bool,
    /// Managed by a DaemonSet
    pub daemon_managed: bool,
    /// System-critical priority
    pub critical: bool,
    /// Already being deleted
    pub terminating: bool,
}

/// One running workload instance (a pod)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    #[serde(flatten)]
    pub id: ReplicaId,
    /// Hosting node; empty when unscheduled
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub owners: Vec<OwnerReference>,
    /// Container images in declaration order
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub priority_class: Option<String>,
    #[serde(default)]
    pub protection: ProtectionFlags,
}

impl Replica {
    /// Create an unscheduled replica with no owner and no containers
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ReplicaId::new(namespace, name),
            node_name: String::new(),
            owners: Vec::new(),
            images: Vec::new(),
            priority: None,
            priority_class: None,
            protection: ProtectionFlags::default(),
        }
    }

    pub fn on_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn owned_by(mut self, owner: OwnerReference) -> Self {
        self.owners.push(owner);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.images.push(image.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_protection(mut self, protection: ProtectionFlags) -> Self {
        self.protection = protection;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.id.namespace
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// The owner reference marked as controller, if any
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owners.iter().find(|o| o.controller)
    }

    pub fn is_scheduled(&self) -> bool {
        !self.node_name.is_empty()
    }
}

/// Node as seen by the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(default)]
    pub unschedulable: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unschedulable: false,
            labels: BTreeMap::new(),
        }
    }
}

/// Immutable cluster state for one planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
    #[serde(default)]
    pub replicas: Vec<Replica>,
    /// Unix timestamp when the snapshot was taken
    #[serde(default)]
    pub taken_at: i64,
}

impl ClusterSnapshot {
    pub fn new(nodes: Vec<NodeInfo>, replicas: Vec<Replica>) -> Self {
        Self {
            nodes,
            replicas,
            taken_at: chrono::Utc::now().timestamp(),
        }
    }
}
