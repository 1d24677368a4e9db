//! Plugin process configuration.
//!
//! Read once at startup and validated into typed values; nothing here is
//! consulted again per request.
//!
//! Environment variables:
//! - `CSI_MODE`: `controller`, `node` or `all` (case-insensitive). Defaults to `all`.
//! - `CSI_NO_PROBE_ON_START`: set to `1`/`true` to report ready without
//!   contacting any backend cluster. Defaults to `0`.
//! - `CSI_PROBE_TIMEOUT_SECS`: upper bound for each cluster health check.
//!   Defaults to 10.
//! - `CSI_CLUSTER_CONFIG`: path to a YAML (or JSON) file listing the backend
//!   clusters. Required.
//!
//! Cluster file layout:
//!
//! ```yaml
//! clusters:
//!   - name: east
//!     endpoint: 10.0.0.1:8080
//!     is_default: true
//!   - name: west
//!     endpoint: 10.0.1.1:8080
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CsiError;
use crate::probe::{DEFAULT_CHECK_TIMEOUT, ProbeOptions};
use crate::types::DeploymentMode;

pub const ENV_MODE: &str = "CSI_MODE";
pub const ENV_NO_PROBE_ON_START: &str = "CSI_NO_PROBE_ON_START";
pub const ENV_PROBE_TIMEOUT_SECS: &str = "CSI_PROBE_TIMEOUT_SECS";
pub const ENV_CLUSTER_CONFIG: &str = "CSI_CLUSTER_CONFIG";

/// One backend cluster entry from the cluster file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Unique cluster name.
    pub name: String,
    /// `host:port` of the management endpoint.
    pub endpoint: String,
    /// At most one cluster may be the default.
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
struct ClusterFile {
    #[serde(default)]
    clusters: Vec<ClusterConfig>,
}

/// Validated plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub mode: DeploymentMode,
    pub skip_probe: bool,
    pub probe_timeout: Duration,
    pub clusters: Vec<ClusterConfig>,
}

impl PluginConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, CsiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CsiError> {
        let mode: DeploymentMode = lookup(ENV_MODE).unwrap_or_default().parse()?;

        let skip_probe = match lookup(ENV_NO_PROBE_ON_START) {
            Some(v) => parse_bool(ENV_NO_PROBE_ON_START, &v)?,
            None => false,
        };

        let probe_timeout = match lookup(ENV_PROBE_TIMEOUT_SECS) {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|e| {
                    CsiError::Configuration(format!("{ENV_PROBE_TIMEOUT_SECS}={v:?}: {e}"))
                })?;
                if secs == 0 {
                    return Err(CsiError::Configuration(format!(
                        "{ENV_PROBE_TIMEOUT_SECS} must be greater than zero"
                    )));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CHECK_TIMEOUT,
        };

        let path = lookup(ENV_CLUSTER_CONFIG).ok_or_else(|| {
            CsiError::Configuration(format!("{ENV_CLUSTER_CONFIG} is not set"))
        })?;
        let clusters = load_clusters(Path::new(&path))?;

        let config = Self {
            mode,
            skip_probe,
            probe_timeout,
            clusters,
        };
        config.validate()?;
        info!(
            %mode,
            skip_probe,
            clusters = config.clusters.len(),
            "plugin configuration loaded",
        );
        Ok(config)
    }

    /// Reject configurations the plugin cannot run with.
    pub fn validate(&self) -> Result<(), CsiError> {
        if self.clusters.is_empty() {
            return Err(CsiError::Configuration(
                "no backend clusters configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            if cluster.name.trim().is_empty() {
                return Err(CsiError::Configuration("cluster name is empty".into()));
            }
            if cluster.endpoint.trim().is_empty() {
                return Err(CsiError::Configuration(format!(
                    "cluster {} has no endpoint",
                    cluster.name
                )));
            }
            if !seen.insert(cluster.name.as_str()) {
                return Err(CsiError::Configuration(format!(
                    "duplicate cluster name {}",
                    cluster.name
                )));
            }
        }

        let defaults = self.clusters.iter().filter(|c| c.is_default).count();
        if defaults > 1 {
            return Err(CsiError::Configuration(format!(
                "{defaults} clusters are marked default, at most one is allowed"
            )));
        }
        Ok(())
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            skip_probe: self.skip_probe,
            check_timeout: self.probe_timeout,
        }
    }
}

/// Read the cluster list from a YAML or JSON file.
pub fn load_clusters(path: &Path) -> Result<Vec<ClusterConfig>, CsiError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CsiError::Configuration(format!("read {}: {e}", path.display())))?;
    let file: ClusterFile = serde_yaml::from_str(&contents)
        .map_err(|e| CsiError::Configuration(format!("parse {}: {e}", path.display())))?;
    Ok(file.clusters)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CsiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(CsiError::Configuration(format!(
            "{key}={other:?} is not a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    const CLUSTERS: &str = "\
clusters:
  - name: east
    endpoint: 10.0.0.1:8080
    is_default: true
  - name: west
    endpoint: 10.0.1.1:8080
";

    fn cluster_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn load(vars: &[(&str, &str)]) -> Result<PluginConfig, CsiError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PluginConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn loads_full_configuration() {
        let file = cluster_file(CLUSTERS);
        let path = file.path().to_str().unwrap();
        let cfg = load(&[
            (ENV_MODE, "Controller"),
            (ENV_NO_PROBE_ON_START, "true"),
            (ENV_PROBE_TIMEOUT_SECS, "3"),
            (ENV_CLUSTER_CONFIG, path),
        ])
        .unwrap();

        assert_eq!(cfg.mode, DeploymentMode::Controller);
        assert!(cfg.skip_probe);
        assert_eq!(cfg.probe_timeout, Duration::from_secs(3));
        assert_eq!(cfg.clusters.len(), 2);
        assert!(cfg.clusters[0].is_default);
        assert!(!cfg.clusters[1].is_default);
        assert_eq!(
            cfg.probe_options(),
            ProbeOptions {
                skip_probe: true,
                check_timeout: Duration::from_secs(3),
            }
        );
    }

    #[test]
    fn defaults_apply() {
        let file = cluster_file(CLUSTERS);
        let cfg = load(&[(ENV_CLUSTER_CONFIG, file.path().to_str().unwrap())]).unwrap();
        assert_eq!(cfg.mode, DeploymentMode::All);
        assert!(!cfg.skip_probe);
        assert_eq!(cfg.probe_timeout, DEFAULT_CHECK_TIMEOUT);
    }

    #[test]
    fn rejects_bad_mode() {
        let file = cluster_file(CLUSTERS);
        let err = load(&[
            (ENV_MODE, "nod"),
            (ENV_CLUSTER_CONFIG, file.path().to_str().unwrap()),
        ])
        .unwrap_err();
        assert!(matches!(err, CsiError::Configuration(_)));
    }

    #[test]
    fn rejects_empty_registry() {
        let file = cluster_file("clusters: []\n");
        let err = load(&[(ENV_CLUSTER_CONFIG, file.path().to_str().unwrap())]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: no backend clusters configured"
        );
    }

    #[test]
    fn rejects_duplicate_names_and_defaults() {
        let dup = cluster_file(
            "clusters:\n  - {name: a, endpoint: 'h:1'}\n  - {name: a, endpoint: 'h:2'}\n",
        );
        let err = load(&[(ENV_CLUSTER_CONFIG, dup.path().to_str().unwrap())]).unwrap_err();
        assert!(err.to_string().contains("duplicate cluster name a"));

        let defaults = cluster_file(
            "clusters:\n  - {name: a, endpoint: 'h:1', is_default: true}\n  - {name: b, endpoint: 'h:2', is_default: true}\n",
        );
        let err = load(&[(ENV_CLUSTER_CONFIG, defaults.path().to_str().unwrap())]).unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn rejects_missing_cluster_file() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains(ENV_CLUSTER_CONFIG));

        let err = load(&[(ENV_CLUSTER_CONFIG, "/nonexistent/clusters.yaml")]).unwrap_err();
        assert!(matches!(err, CsiError::Configuration(_)));
    }

    #[test]
    fn rejects_bad_flags() {
        let file = cluster_file(CLUSTERS);
        let path = file.path().to_str().unwrap();
        assert!(load(&[(ENV_NO_PROBE_ON_START, "maybe"), (ENV_CLUSTER_CONFIG, path)]).is_err());
        assert!(load(&[(ENV_PROBE_TIMEOUT_SECS, "0"), (ENV_CLUSTER_CONFIG, path)]).is_err());
        assert!(load(&[(ENV_PROBE_TIMEOUT_SECS, "soon"), (ENV_CLUSTER_CONFIG, path)]).is_err());
    }
}
