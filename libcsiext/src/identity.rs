//! CSI Identity service trait.
//!
//! The Identity service allows callers to discover plugin metadata and check
//! plugin health.  Every CSI plugin must implement this service.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{PluginCapability, PluginInfo, ReadinessReport};

/// Identity service — plugin discovery and health probing.
///
/// This maps to the standard CSI Identity service, simplified for RK8s.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    /// Return the plugin name, version and build manifest.
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError>;

    /// Readiness probe over every backend cluster.
    ///
    /// A failing backend is reported as a not-ready [`ReadinessReport`];
    /// `Err` is reserved for a probe that could not complete, such as
    /// [`CsiError::Cancelled`].
    async fn probe(&self) -> Result<ReadinessReport, CsiError>;

    /// Advertise the capabilities supported by this plugin.
    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError>;
}
