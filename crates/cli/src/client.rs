//! Kubernetes client construction

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Connect using an explicit kubeconfig, or the default discovery chain
///
/// The default chain tries `KUBECONFIG`, then `~/.kube/config`, then the
/// in-cluster service account.
pub async fn connect(kubeconfig: Option<&str>) -> Result<Client> {
    // A path list is left to the default chain, which merges it
    let Some(path) = kubeconfig.filter(|p| !p.contains(':')) else {
        return Client::try_default()
            .await
            .context("Failed to create Kubernetes client");
    };

    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Invalid kubeconfig")?;

    Client::try_from(config).context("Failed to create Kubernetes client")
}
