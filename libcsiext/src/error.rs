//! CSI error types.
//!
//! All errors in the `libcsiext` crate are represented by the [`CsiError`]
//! enum, which derives [`thiserror::Error`] for ergonomic error handling and
//! also implements [`Serialize`]/[`Deserialize`] so errors can travel across
//! the QUIC transport layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProbeResult;

/// Unified error type for CSI identity and replication operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum CsiError {
    /// One or more backend clusters failed their health check.
    #[error("plugin not ready: {}", FailureList(.failures))]
    NotReady {
        /// Every failing cluster with its reason.
        failures: Vec<ProbeResult>,
    },

    /// The probe was abandoned before every check finished.
    #[error("probe cancelled: {0}")]
    Cancelled(String),

    /// Invalid process configuration (mode, cluster registry, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A lifecycle operation was requested from a state that forbids it.
    #[error("{operation} is not legal from protection group state {state}")]
    IllegalTransition {
        /// Name of the rejected operation.
        operation: String,
        /// State the protection group was in.
        state: String,
    },

    /// A single cluster health check failed.
    #[error("health check failed: {0}")]
    HealthCheck(String),

    /// A QUIC / transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CsiError {
    /// Create a [`CsiError::HealthCheck`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn health_check<E: fmt::Display>(e: E) -> Self {
        Self::HealthCheck(e.to_string())
    }

    /// Create a [`CsiError::TransportError`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: fmt::Display>(e: E) -> Self {
        Self::TransportError(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Create a [`CsiError::Configuration`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn configuration<E: fmt::Display>(e: E) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// Renders `a (reason); b (reason)` for the `NotReady` message.
struct FailureList<'a>(&'a [ProbeResult]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(
                f,
                "{} ({})",
                failure.cluster_id,
                failure.failure_reason.as_deref().unwrap_or("unknown reason")
            )?;
        }
        Ok(())
    }
}
