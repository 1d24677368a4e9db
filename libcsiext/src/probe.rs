//! Readiness aggregation across backend clusters.
//!
//! [`ClusterProbeAggregator::probe`] fans out one Tokio task per registered
//! cluster and waits for all of them.  The plugin is ready only when every
//! cluster passes; the report names every cluster that did not.
//!
//! Two bounds keep a probe from hanging:
//!
//! * each check runs under [`ProbeOptions::check_timeout`], and a check that
//!   overruns is recorded as a failure for its cluster while the others still
//!   report normally;
//! * the caller's [`CancellationToken`] aborts all in-flight checks and turns
//!   the probe into [`CsiError::Cancelled`] rather than a partial report.
//!
//! The aggregator never retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cluster::{ClusterHandle, ClusterHealthCheck};
use crate::error::CsiError;
use crate::types::{ProbeResult, ReadinessReport};

/// Upper bound for a single cluster check when none is configured.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe behaviour fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Report ready without contacting any cluster.
    ///
    /// Meant for environments where backend connectivity is guaranteed
    /// out-of-band; it removes all backend coverage from the probe.
    pub skip_probe: bool,
    /// Upper bound for each cluster check.
    pub check_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            skip_probe: false,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }
}

/// Runs health checks against every cluster and combines the results.
pub struct ClusterProbeAggregator {
    checker: Arc<dyn ClusterHealthCheck>,
    options: ProbeOptions,
}

impl ClusterProbeAggregator {
    pub fn new(checker: Arc<dyn ClusterHealthCheck>, options: ProbeOptions) -> Self {
        Self { checker, options }
    }

    pub fn options(&self) -> ProbeOptions {
        self.options
    }

    /// Check every cluster in `clusters` and aggregate the outcome.
    ///
    /// Returns `Ok` with a not-ready report when clusters fail, and
    /// [`CsiError::Cancelled`] when `cancel` fires before every check has
    /// finished.
    #[instrument(skip_all, fields(clusters = clusters.len()))]
    pub async fn probe(
        &self,
        clusters: &[Arc<ClusterHandle>],
        cancel: &CancellationToken,
    ) -> Result<ReadinessReport, CsiError> {
        if self.options.skip_probe {
            debug!("skip_probe is set, reporting ready without contacting clusters");
            return Ok(ReadinessReport::ready());
        }

        // Slots are keyed by position so that clusters sharing an id are
        // still accounted for one by one.
        let mut slots: Vec<Option<ProbeResult>> = vec![None; clusters.len()];
        let mut tasks = JoinSet::new();
        for (index, cluster) in clusters.iter().enumerate() {
            let checker = Arc::clone(&self.checker);
            let cluster = Arc::clone(cluster);
            let limit = self.options.check_timeout;
            tasks.spawn(async move { (index, check_one(checker.as_ref(), &cluster, limit).await) });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    let outstanding = slots.iter().filter(|slot| slot.is_none()).count();
                    warn!(
                        completed = clusters.len() - outstanding,
                        outstanding,
                        "probe cancelled, abandoning cluster checks",
                    );
                    return Err(CsiError::Cancelled(format!(
                        "{outstanding} of {} cluster checks outstanding",
                        clusters.len()
                    )));
                }
                next = tasks.join_next() => match next {
                    Some(Ok((index, result))) => slots[index] = Some(result),
                    Some(Err(e)) => warn!(error = %e, "cluster health check task failed"),
                    None => break,
                }
            }
        }

        // A slot left empty belongs to a task that panicked.
        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(clusters)
            .map(|(slot, cluster)| {
                slot.unwrap_or_else(|| {
                    ProbeResult::failed(cluster.id.clone(), "health check task did not complete")
                })
            })
            .collect();

        let report = ReadinessReport::from_results(results);
        if report.ready {
            debug!("all clusters ready");
        } else {
            for failure in &report.failures {
                warn!(
                    cluster = %failure.cluster_id,
                    reason = failure.failure_reason.as_deref().unwrap_or_default(),
                    "cluster probe failed",
                );
            }
            info!(failed = report.failures.len(), "probe returning not ready");
        }
        Ok(report)
    }
}

async fn check_one(
    checker: &dyn ClusterHealthCheck,
    cluster: &ClusterHandle,
    limit: Duration,
) -> ProbeResult {
    match tokio::time::timeout(limit, checker.check(cluster)).await {
        Ok(Ok(())) => ProbeResult::passed(cluster.id.clone()),
        Ok(Err(CsiError::HealthCheck(reason))) => ProbeResult::failed(cluster.id.clone(), reason),
        Ok(Err(e)) => ProbeResult::failed(cluster.id.clone(), e.to_string()),
        Err(_) => ProbeResult::failed(
            cluster.id.clone(),
            format!("health check timed out after {limit:?}"),
        ),
    }
}
