//! Channel-list retrieval from live endpoints.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info};
use tokio::sync::Semaphore;

use iptvscan_protocol::{parse_listing, ChannelRecord, LiveEndpoint, ScanError};

use crate::metrics::ScanMetrics;
use crate::transport::{get_within, HttpTransport};

/// Raw records gathered from all live endpoints.
#[derive(Debug, Default)]
pub struct ListingOutcome {
    pub records: Vec<ChannelRecord>,
    pub failed: usize,
}

/// Fetches and parses listings under the same discovery gate as probing.
pub struct ListingFetcher {
    transport: Arc<dyn HttpTransport>,
    gate: Arc<Semaphore>,
    timeout: Duration,
    metrics: Arc<ScanMetrics>,
}

impl ListingFetcher {
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

    /// Fetch one listing once and parse it.
    pub async fn fetch_one(&self, endpoint: &LiveEndpoint) -> Result<Vec<ChannelRecord>, ScanError> {
        let fetch_failure = |reason: String| ScanError::ListingFetchFailure {
            url: endpoint.url.clone(),
            reason,
        };

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| fetch_failure("discovery gate closed".to_string()))?;
        let _in_flight = self.metrics.enter_discovery();

        let response = get_within(self.transport.as_ref(), &endpoint.url, self.timeout)
            .await
            .and_then(|r| r.require_success())
            .map_err(|e| fetch_failure(e.to_string()))?;

        parse_listing(&response.text(), endpoint.format, &endpoint.url)
    }

    /// Fetch every listing; a failing endpoint contributes no records.
    pub async fn fetch_all(&self, endpoints: &[LiveEndpoint]) -> ListingOutcome {
        let results = join_all(endpoints.iter().map(|endpoint| async move {
            (endpoint, self.fetch_one(endpoint).await)
        }))
        .await;

        let mut outcome = ListingOutcome::default();
        for (endpoint, result) in results {
            match result {
                Ok(records) => {
                    debug!("{} channels from {}", records.len(), endpoint.url);
                    self.metrics.record_raw_records(records.len());
                    outcome.records.extend(records);
                }
                Err(e) => {
                    debug!("{}", e);
                    self.metrics.record_error(e.kind());
                    outcome.failed += 1;
                }
            }
        }

        info!(
            "Collected {} channel records from {} listings",
            outcome.records.len(),
            endpoints.len()
        );
        outcome
    }
}
