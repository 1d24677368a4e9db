//! # libcsiext — CSI identity & replication negotiation for RK8s
//!
//! `libcsiext` is the control-plane negotiation layer of a storage plugin
//! that fronts several backend clusters.  It answers the orchestrator's
//! discovery questions: which operations the plugin supports, whether the
//! plugin and every backend behind it are ready, and which disaster-recovery
//! actions it can run on protection groups.  It follows the RK8s
//! conventions (Tokio async runtime, `tracing` for observability,
//! `thiserror` for structured errors, QUIC via [`quinn`] for transport).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Deployment mode, plugin identity, capabilities, readiness. |
//! | [`error`] | [`CsiError`] enum covering all failure modes. |
//! | [`catalog`] | Protection-group lifecycle and action legality. |
//! | [`registry`] | [`CapabilityRegistry`] — mode-gated advertisement. |
//! | [`cluster`] | Cluster handles and the [`ClusterHealthCheck`] seam. |
//! | [`probe`] | [`ClusterProbeAggregator`] — bounded readiness fan-out. |
//! | [`identity`] | [`CsiIdentity`] trait — plugin discovery & health. |
//! | [`replication`] | [`CsiReplication`] trait — replication discovery. |
//! | [`service`] | [`IdentityService`] implementing both traits. |
//! | [`config`] | [`PluginConfig`] loaded from the environment. |
//! | [`message`] | [`CsiMessage`] protocol envelope for QUIC transport. |
//! | [`transport`] | QUIC client/server built on `quinn`, plus TLS setup. |

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod identity;
pub mod message;
pub mod probe;
pub mod registry;
pub mod replication;
pub mod service;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use catalog::{ActionType, LifecycleOperation, ProtectionGroupState};
pub use cluster::{ClusterHandle, ClusterHealthCheck, ClusterRegistry, TcpHealthCheck};
pub use config::PluginConfig;
pub use error::CsiError;
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use probe::{ClusterProbeAggregator, ProbeOptions};
pub use registry::CapabilityRegistry;
pub use replication::{CsiReplication, ReplicationCapabilities, ReplicationRpc};
pub use service::IdentityService;
pub use types::*;
