//! Run-wide counters and the end-of-run report.
//!
//! Counters are plain atomics so discovery futures and bench workers can
//! update them without holding any lock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::info;

use iptvscan_protocol::ErrorKind;

/// Counters for a single pipeline run.
pub struct ScanMetrics {
    start_time: Instant,
    seeds_accepted: AtomicU64,
    candidates: AtomicU64,
    live_endpoints: AtomicU64,
    raw_records: AtomicU64,
    unique_records: AtomicU64,
    bench_ok: AtomicU64,
    bytes_measured: AtomicU64,
    /// Discovery operations currently holding a gate slot.
    in_flight: AtomicUsize,
    /// Highest value `in_flight` reached.
    peak_in_flight: AtomicUsize,
    errors: [AtomicU64; ErrorKind::ALL.len()],
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            seeds_accepted: AtomicU64::new(0),
            candidates: AtomicU64::new(0),
            live_endpoints: AtomicU64::new(0),
            raw_records: AtomicU64::new(0),
            unique_records: AtomicU64::new(0),
            bench_ok: AtomicU64::new(0),
            bytes_measured: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            errors: Default::default(),
        }
    }

    pub fn record_error(&self, kind: ErrorKind) {
        self.errors[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.errors[kind_index(kind)].load(Ordering::Relaxed)
    }

    pub fn record_seeds(&self, accepted: usize) {
        self.seeds_accepted.fetch_add(accepted as u64, Ordering::Relaxed);
    }

    pub fn record_candidates(&self, count: usize) {
        self.candidates.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_live(&self) {
        self.live_endpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_raw_records(&self, count: usize) {
        self.raw_records.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_unique_records(&self, count: usize) {
        self.unique_records.store(count as u64, Ordering::Relaxed);
    }

    pub fn record_bench_ok(&self, bytes: u64) {
        self.bench_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_measured.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Mark a discovery operation as started; the returned guard marks it finished.
    pub fn enter_discovery(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlightGuard(&self.in_flight)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn bench_ok(&self) -> u64 {
        self.bench_ok.load(Ordering::Relaxed)
    }

    /// Channels that produced no speed sample.
    pub fn bench_failed(&self) -> u64 {
        ErrorKind::ALL
            .iter()
            .filter(|kind| kind.is_bench())
            .map(|kind| self.error_count(*kind))
            .sum()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Freeze the counters into a report.
    pub fn report(&self) -> ScanReport {
        let errors = ErrorKind::ALL
            .iter()
            .map(|kind| (*kind, self.error_count(*kind)))
            .filter(|(_, count)| *count > 0)
            .collect();

        ScanReport {
            elapsed: self.elapsed(),
            seeds_accepted: self.seeds_accepted.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            live_endpoints: self.live_endpoints.load(Ordering::Relaxed),
            raw_records: self.raw_records.load(Ordering::Relaxed),
            unique_records: self.unique_records.load(Ordering::Relaxed),
            bench_ok: self.bench_ok(),
            bench_failed: self.bench_failed(),
            bytes_measured: self.bytes_measured.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight(),
            errors,
        }
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_index(kind: ErrorKind) -> usize {
    ErrorKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

/// Decrements the in-flight counter on drop.
pub struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of a finished run.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub elapsed: Duration,
    pub seeds_accepted: u64,
    pub candidates: u64,
    pub live_endpoints: u64,
    pub raw_records: u64,
    pub unique_records: u64,
    pub bench_ok: u64,
    pub bench_failed: u64,
    pub bytes_measured: u64,
    pub peak_in_flight: usize,
    pub errors: BTreeMap<ErrorKind, u64>,
}

impl ScanReport {
    pub fn log_summary(&self) {
        info!("Scan finished in {:.1}s", self.elapsed.as_secs_f64());
        info!("  Seeds: {}  Candidates: {}  Live endpoints: {}", self.seeds_accepted, self.candidates, self.live_endpoints);
        info!("  Records: {} raw, {} unique", self.raw_records, self.unique_records);
        info!(
            "  Channels: {} reachable, {} unreachable ({:.2} MB measured)",
            self.bench_ok,
            self.bench_failed,
            self.bytes_measured as f64 / iptvscan_protocol::BYTES_PER_MEGABYTE
        );
        info!("  Peak concurrent discovery requests: {}", self.peak_in_flight);
        for (kind, count) in &self.errors {
            info!("  {}: {}", kind, count);
        }
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "live={} records={} reachable={} unreachable={}",
            self.live_endpoints, self.unique_records, self.bench_ok, self.bench_failed
        )
    }
}
