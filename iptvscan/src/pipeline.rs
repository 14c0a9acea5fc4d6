//! Pipeline driver.
//!
//! Phase A (discovery) runs every probe and listing fetch as one fan-out on
//! the calling task, bounded by a shared semaphore of `C` permits. Phase B
//! (bench) hands the deduplicated records to a pool of `W` workers. Each
//! phase finishes completely before the next one starts.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;
use tokio::sync::Semaphore;

use iptvscan_protocol::SeedAddress;

use crate::bench::{BenchFailure, BenchPool, ThroughputBench};
use crate::canonical::{CanonicalError, Canonicalizer};
use crate::config::{ConfigError, ScanConfig};
use crate::dedup::dedup_records;
use crate::metrics::{ScanMetrics, ScanReport};
use crate::ranker::{RankedPlaylist, Ranker};
use crate::scanner::{CandidateGenerator, ListingFetcher, LivenessProber};
use crate::transport::{HttpTransport, TransportError};

/// Failures that stop a run before or after the per-item stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Seed list is empty")]
    EmptySeedList,

    #[error("No harvest sources given")]
    EmptySourceList,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid rewrite rules: {0}")]
    Rules(#[from] CanonicalError),

    #[error("HTTP client setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a run produces.
#[derive(Debug)]
pub struct ScanOutput {
    pub playlist: RankedPlaylist,
    /// Channels that produced no speed sample.
    pub unreachable: Vec<BenchFailure>,
    pub report: ScanReport,
}

pub struct ScanPipeline {
    config: ScanConfig,
    transport: Arc<dyn HttpTransport>,
    canonicalizer: Canonicalizer,
}

impl ScanPipeline {
    /// Build the rule set once and bind it to the run.
    pub fn new(config: ScanConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, PipelineError> {
        let mut rules = Canonicalizer::standard_builder()?;
        for (from, to) in &config.extra_synonyms {
            rules = rules.synonym(from.as_str(), to.as_str());
        }
        Ok(Self {
            config,
            transport,
            canonicalizer: rules.build(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn run(&self, seeds: &[SeedAddress]) -> Result<ScanOutput, PipelineError> {
        if seeds.is_empty() {
            return Err(PipelineError::EmptySeedList);
        }
        let config = &self.config;
        let metrics = Arc::new(ScanMetrics::new());

        // Phase A: discovery.
        let batch = CandidateGenerator::new(config.listings.clone()).generate(seeds);
        for error in &batch.malformed {
            metrics.record_error(error.kind());
        }
        metrics.record_seeds(seeds.len() - batch.malformed.len());
        metrics.record_candidates(batch.candidates.len());
        info!(
            "{} seeds ({} malformed) expanded to {} blocks, {} candidates",
            seeds.len(),
            batch.malformed.len(),
            batch.blocks.len(),
            batch.candidates.len()
        );

        let gate = Arc::new(Semaphore::new(config.concurrency));
        let prober = LivenessProber::new(
            Arc::clone(&self.transport),
            Arc::clone(&gate),
            config.probe_timeout,
            Arc::clone(&metrics),
        );
        let probed = prober.probe_all(batch.candidates).await;
        debug!("{} probes failed", probed.failed);

        let fetcher = ListingFetcher::new(
            Arc::clone(&self.transport),
            gate,
            config.fetch_timeout,
            Arc::clone(&metrics),
        );
        let listings = fetcher.fetch_all(&probed.live).await;
        if listings.failed > 0 {
            info!("{} of {} listings returned nothing usable", listings.failed, probed.live.len());
        }

        let canonical = listings
            .records
            .into_iter()
            .map(|record| self.canonicalizer.canonicalize_record(record));
        let unique = dedup_records(canonical);
        metrics.record_unique_records(unique.len());
        info!("{} unique channel records after canonicalization", unique.len());

        // Phase B: bench.
        let bench = ThroughputBench::new(
            Arc::clone(&self.transport),
            config.bench_timeout,
            config.speed_clamp,
        );
        let outcome = BenchPool::new(bench, config.workers, Arc::clone(&metrics))
            .run(unique)
            .await;

        let ranker = Ranker::new(config.markers.clone(), config.per_name_cap, config.utc_offset);
        let playlist = ranker.rank(outcome.samples);

        Ok(ScanOutput {
            playlist,
            unreachable: outcome.failures,
            report: metrics.report(),
        })
    }
}
