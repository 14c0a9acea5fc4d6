//! Fixed-size worker pool draining the bench queue.
//!
//! Every record is enqueued up front, the sender is dropped, and `W` workers
//! pull from the shared receiver until it is empty. The driver waits on the
//! worker join handles, so it resumes only after the queue is fully drained.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};

use iptvscan_protocol::{ChannelRecord, ScanError, SpeedSample};

use crate::bench::throughput::ThroughputBench;
use crate::metrics::ScanMetrics;

/// A channel that produced no sample.
#[derive(Debug, Clone)]
pub struct BenchFailure {
    pub record: ChannelRecord,
    pub error: ScanError,
}

/// Collected results of one bench run. Order is completion order.
#[derive(Debug, Default)]
pub struct BenchOutcome {
    pub samples: Vec<SpeedSample>,
    pub failures: Vec<BenchFailure>,
}

/// Append-only result collections shared by the workers.
#[derive(Default)]
struct Results {
    outcome: Mutex<BenchOutcome>,
}

impl Results {
    /// Append one result and return progress as `(ok, failed)`.
    async fn push(&self, result: Result<SpeedSample, BenchFailure>) -> (usize, usize) {
        let mut outcome = self.outcome.lock().await;
        match result {
            Ok(sample) => outcome.samples.push(sample),
            Err(failure) => outcome.failures.push(failure),
        }
        (outcome.samples.len(), outcome.failures.len())
    }
}

/// Runs [`ThroughputBench`] over many records with `workers` in parallel.
pub struct BenchPool {
    bench: ThroughputBench,
    workers: usize,
    metrics: Arc<ScanMetrics>,
}

impl BenchPool {
    pub fn new(bench: ThroughputBench, workers: usize, metrics: Arc<ScanMetrics>) -> Self {
        Self {
            bench,
            workers: workers.max(1),
            metrics,
        }
    }

    /// Measure every record and return once all of them are processed.
    pub async fn run(&self, records: Vec<ChannelRecord>) -> BenchOutcome {
        let total = records.len();
        if total == 0 {
            return BenchOutcome::default();
        }

        let (tx, rx) = mpsc::channel(total);
        for record in records {
            if tx.send(record).await.is_err() {
                break;
            }
        }
        drop(tx);

        let worker_count = self.workers.min(total);
        info!("Benchmarking {} channels with {} workers", total, worker_count);

        let queue = Arc::new(Mutex::new(rx));
        let results = Arc::new(Results::default());

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let results = Arc::clone(&results);
                let bench = self.bench.clone();
                let metrics = Arc::clone(&self.metrics);
                tokio::spawn(async move {
                    worker_loop(worker_id, queue, results, bench, metrics, total).await
                })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Bench worker terminated abnormally: {}", e);
            }
        }

        let outcome = std::mem::take(&mut *results.outcome.lock().await);
        info!(
            "Bench finished: {} reachable, {} unreachable",
            outcome.samples.len(),
            outcome.failures.len()
        );
        outcome
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<ChannelRecord>>>,
    results: Arc<Results>,
    bench: ThroughputBench,
    metrics: Arc<ScanMetrics>,
    total: usize,
) {
    loop {
        // The lock is released before measuring so other workers can claim items.
        let next = queue.lock().await.recv().await;
        let Some(record) = next else {
            break;
        };

        let result = match bench.measure(record.clone()).await {
            Ok(measurement) => {
                metrics.record_bench_ok(measurement.bytes);
                Ok(measurement.sample)
            }
            Err(error) => {
                debug!("[worker {}] {}", worker_id, error);
                metrics.record_error(error.kind());
                Err(BenchFailure { record, error })
            }
        };

        let (ok, failed) = results.push(result).await;
        let done = ok + failed;
        info!(
            "Progress: {} ok, {} failed, {}/{} ({:.2}%)",
            ok,
            failed,
            done,
            total,
            done as f64 / total as f64 * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bench::throughput::SpeedClamp;
    use crate::transport::fake::FakeTransport;
    use iptvscan_protocol::ErrorKind;

    fn pool(transport: Arc<FakeTransport>, workers: usize, metrics: Arc<ScanMetrics>) -> BenchPool {
        let bench = ThroughputBench::new(transport, Duration::from_millis(500), SpeedClamp::default());
        BenchPool::new(bench, workers, metrics)
    }

    #[tokio::test]
    async fn test_pool_drains_queue_within_worker_limit() {
        let mut fake = FakeTransport::new().with_delay(Duration::from_millis(2));
        let mut records = Vec::new();
        for i in 0..20 {
            let manifest = format!("http://h/{}/index.m3u8", i);
            fake = fake
                .respond(&manifest, 200, "seg.ts\n")
                .respond(&format!("http://h/{}/seg.ts", i), 200, vec![0u8; 1024]);
            records.push(ChannelRecord::new(format!("CCTV{}", i), manifest));
        }
        records.push(ChannelRecord::new("湖南卫视", "http://dead/index.m3u8"));

        let transport = Arc::new(fake);
        let metrics = Arc::new(ScanMetrics::new());
        let outcome = pool(Arc::clone(&transport), 3, Arc::clone(&metrics))
            .run(records)
            .await;

        assert_eq!(outcome.samples.len(), 20);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].record.name, "湖南卫视");
        assert_eq!(outcome.failures[0].error.kind(), ErrorKind::BenchManifestFailure);
        assert!(transport.peak() <= 3, "peak was {}", transport.peak());
        assert_eq!(metrics.bench_ok(), 20);
        assert_eq!(metrics.bench_failed(), 1);
        assert!(outcome
            .samples
            .iter()
            .all(|s| s.speed_mb_s >= 0.001 && s.speed_mb_s <= 100.0));
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let outcome = pool(Arc::new(FakeTransport::new()), 4, Arc::new(ScanMetrics::new()))
            .run(Vec::new())
            .await;
        assert!(outcome.samples.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_progress_counts_are_read_with_the_push() {
        let results = Results::default();
        let failure = BenchFailure {
            record: ChannelRecord::new("CCTV1", "http://h/a.m3u8"),
            error: ScanError::BenchEmptyBody {
                url: "http://h/a.ts".to_string(),
            },
        };
        let sample = SpeedSample {
            name: "CCTV2".to_string(),
            url: "http://h/b.m3u8".to_string(),
            speed_mb_s: 1.0,
        };

        assert_eq!(results.push(Err(failure)).await, (0, 1));
        assert_eq!(results.push(Ok(sample)).await, (1, 1));
    }

    #[tokio::test]
    async fn test_zero_workers_still_drains() {
        let transport = FakeTransport::new()
            .respond("http://h/a.m3u8", 200, "a.ts\n")
            .respond("http://h/a.ts", 200, vec![0u8; 8]);
        let outcome = pool(Arc::new(transport), 0, Arc::new(ScanMetrics::new()))
            .run(vec![ChannelRecord::new("CCTV1", "http://h/a.m3u8")])
            .await;
        assert_eq!(outcome.samples.len(), 1);
    }
}
