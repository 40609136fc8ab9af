//! Cluster snapshot sources

use crate::models::ClusterSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Provides the cluster state for one planning pass
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Take a snapshot of nodes and replicas
    async fn snapshot(&self) -> Result<ClusterSnapshot>;
}

/// Reads a JSON-encoded [`ClusterSnapshot`] from disk on every call
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn snapshot(&self) -> Result<ClusterSnapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", self.path.display()))
    }
}

/// Serves a fixed snapshot
pub struct StaticSnapshotSource {
    snapshot: ClusterSnapshot,
}

impl StaticSnapshotSource {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn snapshot(&self) -> Result<ClusterSnapshot> {
        Ok(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeInfo, Replica};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        let snapshot = ClusterSnapshot::new(
            vec![NodeInfo::new("n1")],
            vec![Replica::new("default", "p1").on_node("n1").with_image("nginx")],
        );
        tokio::fs::write(&path, serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();

        let loaded = FileSnapshotSource::new(&path).snapshot().await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let source = FileSnapshotSource::new("/nonexistent/snapshot.json");
        let err = source.snapshot().await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/snapshot.json"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert!(FileSnapshotSource::new(&path).snapshot().await.is_err());
    }
}
