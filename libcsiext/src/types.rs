//! Core CSI negotiation types: deployment mode, plugin identity, plugin
//! capabilities, and readiness results.
//!
//! These types form the data model shared by the CSI traits, transport layer,
//! and the concrete service.  They are all [`Serialize`]/[`Deserialize`] so
//! they can be transmitted over QUIC as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CsiError;

/// Default plugin name reported by `GetPluginInfo`.
pub const PLUGIN_NAME: &str = "rk8s.replication.csi";

/// Project URL recorded in the plugin manifest.
const PLUGIN_URL: &str = "https://github.com/rk8s-dev/rk8s";

// ---------------------------------------------------------------------------
// Deployment mode
// ---------------------------------------------------------------------------

/// Role this plugin process plays in the cluster.
///
/// Set once from configuration and never changed afterwards.  A
/// [`DeploymentMode::Node`] instance owns no control-plane responsibilities
/// and therefore advertises no controller, expansion, or replication
/// capabilities.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Controller service only.
    Controller,
    /// Node service only.
    Node,
    /// Controller and Node services in the same process.
    #[default]
    All,
}

impl DeploymentMode {
    /// Whether this mode carries control-plane responsibilities.
    pub fn is_controller(self) -> bool {
        !matches!(self, Self::Node)
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Controller => "controller",
            Self::Node => "node",
            Self::All => "all",
        })
    }
}

impl FromStr for DeploymentMode {
    type Err = CsiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controller" => Ok(Self::Controller),
            "node" => Ok(Self::Node),
            // An unset mode runs both services.
            "all" | "" => Ok(Self::All),
            other => Err(CsiError::Configuration(format!(
                "unknown deployment mode {other:?}, expected controller, node or all"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Plugin identity & capabilities
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"rk8s.replication.csi"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
    /// Build metadata (`semver`, `commit`, `url`, `formed`).
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
}

impl PluginInfo {
    /// Identity assembled from build-time constants.
    ///
    /// `CSI_BUILD_COMMIT` and `CSI_BUILD_DATE` are picked up when they are
    /// set in the environment of the compiler.
    pub fn from_build() -> Self {
        let version = env!("CARGO_PKG_VERSION");
        let mut manifest = BTreeMap::from([
            ("semver".to_owned(), version.to_owned()),
            ("url".to_owned(), PLUGIN_URL.to_owned()),
        ]);
        if let Some(commit) = option_env!("CSI_BUILD_COMMIT") {
            manifest.insert("commit".to_owned(), commit.to_owned());
        }
        if let Some(formed) = option_env!("CSI_BUILD_DATE") {
            manifest.insert("formed".to_owned(), formed.to_owned());
        }
        Self {
            name: PLUGIN_NAME.to_owned(),
            vendor_version: version.to_owned(),
            manifest,
        }
    }
}

/// Plugin-level services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Plugin provides a Controller service.
    ControllerService,
}

/// Volume expansion modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VolumeExpansionType {
    /// Volumes can be expanded while published.
    Online,
    /// Volumes can be expanded while unpublished.
    Offline,
}

/// Capabilities advertised by the CSI plugin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PluginCapability {
    /// A plugin service.
    Service(ServiceType),
    /// A volume expansion mode.
    VolumeExpansion(VolumeExpansionType),
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Identifier of a registered backend cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub String);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClusterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClusterId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Outcome of one cluster health check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    /// Cluster that was checked.
    pub cluster_id: ClusterId,
    /// Whether the cluster passed.
    pub ok: bool,
    /// Why the check failed, when it did.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl ProbeResult {
    /// A passing result.
    pub fn passed(cluster_id: ClusterId) -> Self {
        Self {
            cluster_id,
            ok: true,
            failure_reason: None,
        }
    }

    /// A failing result with the given reason.
    pub fn failed(cluster_id: ClusterId, reason: impl Into<String>) -> Self {
        Self {
            cluster_id,
            ok: false,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Aggregate readiness over every registered cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessReport {
    /// `true` iff every cluster passed.
    pub ready: bool,
    /// Failing clusters, ordered by cluster id.
    #[serde(default)]
    pub failures: Vec<ProbeResult>,
}

impl ReadinessReport {
    /// A report with no failures.
    pub fn ready() -> Self {
        Self {
            ready: true,
            failures: Vec::new(),
        }
    }

    /// Build a report from every per-cluster result.
    pub fn from_results(results: impl IntoIterator<Item = ProbeResult>) -> Self {
        let mut failures: Vec<ProbeResult> = results.into_iter().filter(|r| !r.ok).collect();
        failures.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
        Self {
            ready: failures.is_empty(),
            failures,
        }
    }

    /// Turn a not-ready report into [`CsiError::NotReady`].
    pub fn into_result(self) -> Result<(), CsiError> {
        if self.ready {
            Ok(())
        } else {
            Err(CsiError::NotReady {
                failures: self.failures,
            })
        }
    }
}
