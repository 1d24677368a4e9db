//! CSI replication extension: capability negotiation.
//!
//! Orchestrators call `GetReplicationCapabilities` to learn which
//! replication RPCs the plugin implements and which protection-group
//! actions it can execute.  Legality of those actions lives in
//! [`crate::catalog`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::ActionType;
use crate::error::CsiError;

/// Replication RPCs a plugin may implement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReplicationRpc {
    /// Create the target-side volume of a replicated pair.
    CreateRemoteVolume,
    /// Pair volumes into a protection group.
    CreateProtectionGroup,
    /// Remove a protection group.
    DeleteProtectionGroup,
    /// Run one of the advertised [`ActionType`]s.
    ExecuteReplicationAction,
    /// Report protection group status.
    MonitorProtectionGroup,
}

impl ReplicationRpc {
    /// Every RPC, in advertisement order.
    pub const ALL: [ReplicationRpc; 5] = [
        Self::CreateRemoteVolume,
        Self::CreateProtectionGroup,
        Self::DeleteProtectionGroup,
        Self::ExecuteReplicationAction,
        Self::MonitorProtectionGroup,
    ];
}

/// Response to `GetReplicationCapabilities`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicationCapabilities {
    /// Supported replication RPCs.
    #[serde(default)]
    pub capabilities: Vec<ReplicationRpc>,
    /// Supported protection-group actions.
    #[serde(default)]
    pub actions: Vec<ActionType>,
}

impl ReplicationCapabilities {
    /// Whether nothing is advertised.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.actions.is_empty()
    }
}

/// Replication service — disaster-recovery capability discovery.
#[async_trait]
pub trait CsiReplication: Send + Sync {
    /// Advertise the replication RPCs and actions supported by this plugin.
    async fn get_replication_capabilities(&self) -> Result<ReplicationCapabilities, CsiError>;
}
