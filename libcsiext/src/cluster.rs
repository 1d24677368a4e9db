//! Backend cluster handles and the health-check seam.
//!
//! Handles are created once from configuration and shared read-only with
//! the probe aggregator.  How a cluster is actually checked is up to the
//! injected [`ClusterHealthCheck`]; [`TcpHealthCheck`] is the built-in
//! reachability check.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::error::CsiError;
use crate::types::ClusterId;

/// A registered backend cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    /// Unique cluster name.
    pub id: ClusterId,
    /// `host:port` of the cluster management endpoint.
    pub endpoint: String,
    /// Whether requests without an explicit cluster go here.
    pub is_default: bool,
}

impl From<&ClusterConfig> for ClusterHandle {
    fn from(cfg: &ClusterConfig) -> Self {
        Self {
            id: ClusterId(cfg.name.clone()),
            endpoint: cfg.endpoint.clone(),
            is_default: cfg.is_default,
        }
    }
}

/// Every cluster this plugin fronts.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    clusters: Vec<Arc<ClusterHandle>>,
}

impl ClusterRegistry {
    /// Build the registry from validated cluster configuration.
    pub fn from_config(clusters: &[ClusterConfig]) -> Self {
        Self {
            clusters: clusters
                .iter()
                .map(|c| Arc::new(ClusterHandle::from(c)))
                .collect(),
        }
    }

    pub fn handles(&self) -> &[Arc<ClusterHandle>] {
        &self.clusters
    }

    pub fn get(&self, id: &ClusterId) -> Option<&Arc<ClusterHandle>> {
        self.clusters.iter().find(|c| &c.id == id)
    }

    pub fn default_cluster(&self) -> Option<&Arc<ClusterHandle>> {
        self.clusters.iter().find(|c| c.is_default)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Per-cluster health check used by the probe aggregator.
///
/// Implementations are invoked concurrently for different clusters and
/// must not mutate the handle.  Retries, if any, belong here.
#[async_trait]
pub trait ClusterHealthCheck: Send + Sync {
    /// `Ok(())` when the cluster is healthy, otherwise the reason it is not.
    async fn check(&self, cluster: &ClusterHandle) -> Result<(), CsiError>;
}

/// Healthy when the cluster endpoint accepts a TCP connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpHealthCheck;

#[async_trait]
impl ClusterHealthCheck for TcpHealthCheck {
    async fn check(&self, cluster: &ClusterHandle) -> Result<(), CsiError> {
        let stream = TcpStream::connect(cluster.endpoint.as_str())
            .await
            .map_err(|e| CsiError::HealthCheck(format!("connect {}: {e}", cluster.endpoint)))?;
        debug!(cluster = %cluster.id, peer = ?stream.peer_addr().ok(), "cluster endpoint reachable");
        Ok(())
    }
}
