//! CSI protocol messages transmitted over QUIC.
//!
//! [`CsiMessage`] is the top-level envelope for all request and response
//! variants exchanged between the orchestrator (client side) and the plugin
//! (server side) via QUIC bi-directional streams.

use serde::{Deserialize, Serialize};

use crate::error::CsiError;
use crate::replication::ReplicationCapabilities;
use crate::types::*;

/// Top-level message envelope for CSI over QUIC.
///
/// Each QUIC bi-stream carries exactly one request followed by one response.
/// The client sends a *request* variant and the server replies with the
/// corresponding *response* variant (or [`CsiMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CsiMessage {
    // ----- Requests --------------------------------------------------------
    /// Readiness probe (Identity).
    Probe,
    /// Query plugin info (Identity).
    GetPluginInfo,
    /// Query plugin capabilities (Identity).
    GetPluginCapabilities,
    /// Query replication capabilities (Replication).
    GetReplicationCapabilities,

    // ----- Responses -------------------------------------------------------
    /// Plugin information.
    PluginInfoResponse(PluginInfo),
    /// Plugin capabilities.
    PluginCapabilitiesResponse(Vec<PluginCapability>),
    /// Replication RPCs and actions.
    ReplicationCapabilitiesResponse(ReplicationCapabilities),
    /// Probe result.
    ProbeResult(ReadinessReport),
    /// An error occurred.
    Error(CsiError),
}

impl std::fmt::Display for CsiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Probe => f.write_str("Probe"),
            Self::GetPluginInfo => f.write_str("GetPluginInfo"),
            Self::GetPluginCapabilities => f.write_str("GetPluginCapabilities"),
            Self::GetReplicationCapabilities => f.write_str("GetReplicationCapabilities"),
            Self::PluginInfoResponse(info) => {
                write!(f, "PluginInfo(name={})", info.name)
            }
            Self::PluginCapabilitiesResponse(caps) => {
                write!(f, "PluginCapabilities(count={})", caps.len())
            }
            Self::ReplicationCapabilitiesResponse(caps) => write!(
                f,
                "ReplicationCapabilities(rpcs={}, actions={})",
                caps.capabilities.len(),
                caps.actions.len()
            ),
            Self::ProbeResult(report) => write!(
                f,
                "ProbeResult(ready={}, failures={})",
                report.ready,
                report.failures.len()
            ),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}
