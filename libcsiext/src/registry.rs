//! Capability registry: what this plugin advertises for a deployment mode.

use crate::catalog::ActionType;
use crate::replication::{ReplicationCapabilities, ReplicationRpc};
use crate::types::{
    DeploymentMode, PluginCapability, PluginInfo, ServiceType, VolumeExpansionType,
};

/// Mode-gated capability advertisement.
///
/// Every getter is a pure function of the mode supplied at construction;
/// repeated calls return equal values.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    mode: DeploymentMode,
    identity: PluginInfo,
}

impl CapabilityRegistry {
    pub fn new(mode: DeploymentMode, identity: PluginInfo) -> Self {
        Self { mode, identity }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn identity(&self) -> &PluginInfo {
        &self.identity
    }

    /// Plugin capabilities; empty for node-only deployments.
    pub fn service_capabilities(&self) -> Vec<PluginCapability> {
        if !self.mode.is_controller() {
            return Vec::new();
        }
        vec![
            PluginCapability::Service(ServiceType::ControllerService),
            PluginCapability::VolumeExpansion(VolumeExpansionType::Online),
            PluginCapability::VolumeExpansion(VolumeExpansionType::Offline),
        ]
    }

    /// Replication RPCs and actions; all or nothing depending on the mode.
    ///
    /// A node instance has no authority over cross-cluster protection
    /// groups, so it advertises none of them.
    pub fn replication_capabilities(&self) -> ReplicationCapabilities {
        if !self.mode.is_controller() {
            return ReplicationCapabilities::default();
        }
        ReplicationCapabilities {
            capabilities: ReplicationRpc::ALL.to_vec(),
            actions: ActionType::ALL.to_vec(),
        }
    }
}
