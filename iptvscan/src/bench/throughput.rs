//! Single-channel throughput measurement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use iptvscan_protocol::{first_segment_reference, ChannelRecord, ScanError, SpeedSample, BYTES_PER_MEGABYTE};

use crate::transport::{get_within, HttpTransport};

/// Bounds every reported speed is forced into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedClamp {
    pub min_mb_s: f64,
    pub max_mb_s: f64,
}

impl SpeedClamp {
    pub fn new(min_mb_s: f64, max_mb_s: f64) -> Self {
        Self { min_mb_s, max_mb_s }
    }

    /// `max(min(speed, max), min)`. NaN maps to `min`.
    pub fn apply(&self, speed: f64) -> f64 {
        if speed.is_nan() {
            return self.min_mb_s;
        }
        speed.min(self.max_mb_s).max(self.min_mb_s)
    }
}

impl Default for SpeedClamp {
    fn default() -> Self {
        Self::new(0.001, 100.0)
    }
}

/// Raw rate in MB/s for `bytes` received over `elapsed`.
pub fn raw_speed(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return f64::INFINITY;
    }
    bytes as f64 / secs / BYTES_PER_MEGABYTE
}

/// Measures first-segment download speed for one channel.
///
/// The manifest is fetched, its first referenced entry is taken (a nested
/// playlist is followed once), and that single segment is downloaded in
/// memory while timing wall-clock duration.
#[derive(Clone)]
pub struct ThroughputBench {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
    clamp: SpeedClamp,
}

/// A measured sample plus the number of bytes it was based on.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub sample: SpeedSample,
    pub bytes: u64,
}

impl ThroughputBench {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration, clamp: SpeedClamp) -> Self {
        Self {
            transport,
            timeout,
            clamp,
        }
    }

    /// Resolve the URL of the segment to time.
    async fn segment_url(&self, manifest_url: &str) -> Result<String, ScanError> {
        let mut manifest_url = manifest_url.to_string();
        let mut followed = false;

        loop {
            let manifest = get_within(self.transport.as_ref(), &manifest_url, self.timeout)
                .await
                .and_then(|r| r.require_success())
                .map_err(|e| ScanError::manifest(&manifest_url, e.to_string()))?;

            let reference = first_segment_reference(&manifest.text())
                .ok_or_else(|| ScanError::manifest(&manifest_url, "no segment referenced"))?;
            let resolved = reference.resolve(&manifest_url);

            if reference.is_playlist() && !followed {
                debug!("Following nested playlist {}", resolved);
                manifest_url = resolved;
                followed = true;
                continue;
            }
            return Ok(resolved);
        }
    }

    /// Measure one channel. Every failure is classified; none panics.
    pub async fn measure(&self, record: ChannelRecord) -> Result<Measurement, ScanError> {
        let segment_url = self.segment_url(&record.url).await?;

        let started = Instant::now();
        let response = get_within(self.transport.as_ref(), &segment_url, self.timeout)
            .await
            .and_then(|r| r.require_success())
            .map_err(|e| ScanError::BenchSegmentFailure {
                url: segment_url.clone(),
                reason: e.to_string(),
            })?;
        let elapsed = started.elapsed();

        let bytes = response.body.len();
        if bytes == 0 {
            return Err(ScanError::BenchEmptyBody { url: segment_url });
        }

        let speed = self.clamp.apply(raw_speed(bytes, elapsed));
        debug!("{} {:.3} MB/s ({} bytes in {:?})", record.name, speed, bytes, elapsed);
        Ok(Measurement {
            sample: SpeedSample::new(record, speed),
            bytes: bytes as u64,
        })
    }
}
