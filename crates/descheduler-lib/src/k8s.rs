//! Kubernetes adapters
//!
//! Converts API objects into snapshot models and submits evictions through
//! the Eviction subresource, which honours PodDisruptionBudgets.

use crate::error::EvictionError;
use crate::eviction::EvictionSink;
use crate::models::{
    ClusterSnapshot, NodeInfo, OwnerReference, ProtectionFlags, Replica, ReplicaId,
};
use crate::policy::SYSTEM_CRITICAL_PRIORITY;
use crate::snapshot::SnapshotSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, EvictParams, ListParams};
use kube::Client;
use tracing::debug;

/// Annotation the kubelet sets on mirror pods of static pods
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// Priority classes that mark a pod as system-critical
const CRITICAL_PRIORITY_CLASSES: &[&str] = &["system-cluster-critical", "system-node-critical"];

/// Pods in these phases have finished and are left out of snapshots
const TERMINAL_PHASES: &[&str] = &["Succeeded", "Failed"];

/// Convert a pod into a replica; `None` if the pod has no name
pub fn replica_from_pod(pod: &Pod) -> Option<Replica> {
    let name = pod.metadata.name.clone()?;
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let spec = pod.spec.as_ref();

    let owners: Vec<OwnerReference> = pod
        .metadata
        .owner_references
        .iter()
        .flatten()
        .map(|o| OwnerReference {
            kind: o.kind.clone(),
            name: o.name.clone(),
            controller: o.controller.unwrap_or(false),
        })
        .collect();

    let images: Vec<String> = spec
        .map(|s| {
            s.containers
                .iter()
                .map(|c| c.image.clone().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let priority = spec.and_then(|s| s.priority);
    let priority_class = spec.and_then(|s| s.priority_class_name.clone());

    let local_storage = spec
        .and_then(|s| s.volumes.as_ref())
        .map(|volumes| {
            volumes
                .iter()
                .any(|v| v.empty_dir.is_some() || v.host_path.is_some())
        })
        .unwrap_or(false);

    let mirror = pod
        .metadata
        .annotations
        .as_ref()
        .map(|a| a.contains_key(MIRROR_POD_ANNOTATION))
        .unwrap_or(false);

    let daemon_managed = owners
        .iter()
        .any(|o| o.controller && o.kind == "DaemonSet");

    let critical = priority
        .map(|p| p >= SYSTEM_CRITICAL_PRIORITY)
        .unwrap_or(false)
        || priority_class
            .as_deref()
            .map(|c| CRITICAL_PRIORITY_CLASSES.contains(&c))
            .unwrap_or(false);

    Some(Replica {
        id: ReplicaId { namespace, name },
        node_name: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
        owners,
        images,
        priority,
        priority_class,
        protection: ProtectionFlags {
            local_storage,
            mirror,
            daemon_managed,
            critical,
            terminating: pod.metadata.deletion_timestamp.is_some(),
        },
    })
}

/// Whether a pod has already run to completion
pub fn is_terminal(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| TERMINAL_PHASES.contains(&phase))
        .unwrap_or(false)
}

/// Convert a node; `None` if the node has no name
pub fn node_from_k8s(node: &Node) -> Option<NodeInfo> {
    Some(NodeInfo {
        name: node.metadata.name.clone()?,
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false),
        labels: node.metadata.labels.clone().unwrap_or_default(),
    })
}

/// Build a snapshot from listed objects
pub fn snapshot_from_objects(
    nodes: impl IntoIterator<Item = Node>,
    pods: impl IntoIterator<Item = Pod>,
) -> ClusterSnapshot {
    let nodes: Vec<NodeInfo> = nodes.into_iter().filter_map(|n| node_from_k8s(&n)).collect();
    let replicas: Vec<Replica> = pods
        .into_iter()
        .filter(|p| !is_terminal(p))
        .filter_map(|p| replica_from_pod(&p))
        .collect();
    ClusterSnapshot::new(nodes, replicas)
}

/// Lists nodes and pods cluster-wide
pub struct KubeSnapshotSource {
    client: Client,
}

impl KubeSnapshotSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for KubeSnapshotSource {
    async fn snapshot(&self) -> Result<ClusterSnapshot> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let pods: Api<Pod> = Api::all(self.client.clone());

        let node_list = nodes
            .list(&ListParams::default())
            .await
            .context("Failed to list nodes")?;
        let pod_list = pods
            .list(&ListParams::default())
            .await
            .context("Failed to list pods")?;

        debug!(
            nodes = node_list.items.len(),
            pods = pod_list.items.len(),
            "Listed cluster state"
        );

        Ok(snapshot_from_objects(node_list.items, pod_list.items))
    }
}

/// Submits evictions through the Eviction API
pub struct KubeEvictionSink {
    client: Client,
}

impl KubeEvictionSink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EvictionSink for KubeEvictionSink {
    async fn evict(&self, replica: &ReplicaId) -> Result<(), EvictionError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &replica.namespace);
        pods.evict(&replica.name, &EvictParams::default())
            .await
            .map(|_| ())
            .map_err(classify_error)
    }
}

/// Map an API error onto an eviction failure
///
/// 429 means a disruption budget currently forbids the eviction.
fn classify_error(err: kube::Error) -> EvictionError {
    match err {
        kube::Error::Api(resp) if resp.code == 429 => {
            EvictionError::DisruptionBudget(resp.message)
        }
        kube::Error::Api(resp) if resp.code == 404 => EvictionError::NotFound,
        other => EvictionError::Api(other.to_string()),
    }
}
