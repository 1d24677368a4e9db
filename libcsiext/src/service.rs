//! The plugin's identity and replication negotiation service.
//!
//! [`IdentityService`] implements [`CsiIdentity`] and [`CsiReplication`] by
//! composing a [`CapabilityRegistry`] with a [`ClusterProbeAggregator`] over
//! the configured [`ClusterRegistry`].  It holds no mutable state, so a
//! single instance can be shared by every request handler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::cluster::{ClusterHealthCheck, ClusterRegistry};
use crate::config::PluginConfig;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::probe::ClusterProbeAggregator;
use crate::registry::CapabilityRegistry;
use crate::replication::{CsiReplication, ReplicationCapabilities};
use crate::types::{PluginCapability, PluginInfo, ReadinessReport};

/// Slack on top of the per-check timeout before a probe is abandoned.
const PROBE_DEADLINE_GRACE: Duration = Duration::from_secs(1);

pub struct IdentityService {
    registry: CapabilityRegistry,
    aggregator: ClusterProbeAggregator,
    clusters: ClusterRegistry,
}

impl IdentityService {
    pub fn new(
        registry: CapabilityRegistry,
        aggregator: ClusterProbeAggregator,
        clusters: ClusterRegistry,
    ) -> Self {
        Self {
            registry,
            aggregator,
            clusters,
        }
    }

    /// Wire up the service from validated configuration.
    pub fn from_config(config: &PluginConfig, checker: Arc<dyn ClusterHealthCheck>) -> Self {
        Self::new(
            CapabilityRegistry::new(config.mode, PluginInfo::from_build()),
            ClusterProbeAggregator::new(checker, config.probe_options()),
            ClusterRegistry::from_config(&config.clusters),
        )
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn clusters(&self) -> &ClusterRegistry {
        &self.clusters
    }

    /// Probe every cluster, giving up when `cancel` fires.
    pub async fn probe_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ReadinessReport, CsiError> {
        self.aggregator.probe(self.clusters.handles(), cancel).await
    }
}

#[async_trait]
impl CsiIdentity for IdentityService {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(self.registry.identity().clone())
    }

    /// Probe with a deadline just past the per-check timeout, so a probe
    /// always finishes even if a check ignores its own bound.
    #[instrument(skip(self))]
    async fn probe(&self) -> Result<ReadinessReport, CsiError> {
        let cancel = CancellationToken::new();
        let deadline = self
            .aggregator
            .options()
            .check_timeout
            .saturating_add(PROBE_DEADLINE_GRACE);
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = self.probe_with_cancel(&cancel).await;
        timer.abort();
        if let Ok(report) = &result {
            debug!(ready = report.ready, "Probe returning");
        }
        result
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(self.registry.service_capabilities())
    }
}

#[async_trait]
impl CsiReplication for IdentityService {
    async fn get_replication_capabilities(&self) -> Result<ReplicationCapabilities, CsiError> {
        Ok(self.registry.replication_capabilities())
    }
}
