//! Liveness probing of candidate endpoints.
//!
//! All probes are driven from one task as a single fan-out; a shared
//! semaphore (the discovery gate) keeps at most `C` requests outstanding.
//! Each probe carries its own timeout, and a failed probe only removes its
//! own candidate from the result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info};
use tokio::sync::Semaphore;

use iptvscan_protocol::{CandidateEndpoint, LiveEndpoint, ScanError};

use crate::metrics::ScanMetrics;
use crate::transport::{probe_within, HttpTransport};

/// Live endpoints found by a probe sweep.
#[derive(Debug, Default)]
pub struct ProbeOutcome {
    pub live: Vec<LiveEndpoint>,
    pub failed: usize,
}

/// Issues GET probes against candidates under the discovery gate.
pub struct LivenessProber {
    transport: Arc<dyn HttpTransport>,
    gate: Arc<Semaphore>,
    timeout: Duration,
    metrics: Arc<ScanMetrics>,
}

impl LivenessProber {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        gate: Arc<Semaphore>,
        timeout: Duration,
        metrics: Arc<ScanMetrics>,
    ) -> Self {
        Self {
            transport,
            gate,
            timeout,
            metrics,
        }
    }

    /// Probe one candidate. Only a 2xx answer within the timeout counts as live.
    pub async fn probe_one(&self, candidate: &CandidateEndpoint) -> Result<(), ScanError> {
        let failure = |reason: String| ScanError::ProbeFailure {
            url: candidate.url.clone(),
            reason,
        };

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| failure("discovery gate closed".to_string()))?;
        let _in_flight = self.metrics.enter_discovery();

        match probe_within(self.transport.as_ref(), &candidate.url, self.timeout).await {
            Ok(status) if (200..300).contains(&status) => Ok(()),
            Ok(status) => Err(failure(format!("HTTP status {}", status))),
            Err(e) => Err(failure(e.to_string())),
        }
    }

    /// Probe every candidate and return the distinct ones that answered.
    pub async fn probe_all(&self, candidates: Vec<CandidateEndpoint>) -> ProbeOutcome {
        let total = candidates.len();
        info!(
            "Probing {} candidates (concurrency {}, timeout {:?})",
            total,
            self.gate.available_permits(),
            self.timeout
        );

        let results = join_all(candidates.into_iter().map(|candidate| async move {
            let result = self.probe_one(&candidate).await;
            (candidate, result)
        }))
        .await;

        let mut outcome = ProbeOutcome::default();
        let mut seen = HashSet::new();
        for (candidate, result) in results {
            match result {
                Ok(()) => {
                    if seen.insert(candidate.url.clone()) {
                        info!("Live endpoint: {}", candidate.url);
                        self.metrics.record_live();
                        outcome.live.push(candidate.into());
                    }
                }
                Err(e) => {
                    debug!("{}", e);
                    self.metrics.record_error(e.kind());
                    outcome.failed += 1;
                }
            }
        }

        info!("Found {} live endpoints out of {} candidates", outcome.live.len(), total);
        outcome
    }
}
