//! Failure taxonomy for the discovery pipeline.
//!
//! Every variant describes an expected, per-item condition. None of them
//! abort a batch; callers count them by [`ErrorKind`] and move on.

use std::fmt;

use thiserror::Error;

/// A classified per-item failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Seed string could not be expanded into candidates.
    #[error("Malformed seed {seed:?}: {reason}")]
    MalformedSeed { seed: String, reason: String },

    /// Probe timed out, failed to connect or returned a non-success status.
    #[error("Probe failed for {url}: {reason}")]
    ProbeFailure { url: String, reason: String },

    /// Listing payload could not be retrieved.
    #[error("Listing fetch failed for {url}: {reason}")]
    ListingFetchFailure { url: String, reason: String },

    /// Listing payload was retrieved but could not be parsed.
    #[error("Listing parse failed for {url}: {reason}")]
    ListingParseFailure { url: String, reason: String },

    /// Manifest fetch failed or the manifest referenced no segment.
    #[error("Manifest failed for {url}: {reason}")]
    BenchManifestFailure { url: String, reason: String },

    /// Segment fetch failed.
    #[error("Segment fetch failed for {url}: {reason}")]
    BenchSegmentFailure { url: String, reason: String },

    /// Segment fetch succeeded with zero bytes.
    #[error("Segment body empty: {url}")]
    BenchEmptyBody { url: String },
}

impl ScanError {
    /// Counter bucket for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::MalformedSeed { .. } => ErrorKind::MalformedSeed,
            ScanError::ProbeFailure { .. } => ErrorKind::ProbeFailure,
            ScanError::ListingFetchFailure { .. } => ErrorKind::ListingFetchFailure,
            ScanError::ListingParseFailure { .. } => ErrorKind::ListingParseFailure,
            ScanError::BenchManifestFailure { .. } => ErrorKind::BenchManifestFailure,
            ScanError::BenchSegmentFailure { .. } => ErrorKind::BenchSegmentFailure,
            ScanError::BenchEmptyBody { .. } => ErrorKind::BenchEmptyBody,
        }
    }

    pub fn malformed_seed(seed: &str, reason: impl Into<String>) -> Self {
        ScanError::MalformedSeed {
            seed: seed.to_string(),
            reason: reason.into(),
        }
    }

    pub fn listing_parse(url: &str, reason: impl Into<String>) -> Self {
        ScanError::ListingParseFailure {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn manifest(url: &str, reason: impl Into<String>) -> Self {
        ScanError::BenchManifestFailure {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Discriminant of [`ScanError`], used as a counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    MalformedSeed,
    ProbeFailure,
    ListingFetchFailure,
    ListingParseFailure,
    BenchManifestFailure,
    BenchSegmentFailure,
    BenchEmptyBody,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::MalformedSeed,
        ErrorKind::ProbeFailure,
        ErrorKind::ListingFetchFailure,
        ErrorKind::ListingParseFailure,
        ErrorKind::BenchManifestFailure,
        ErrorKind::BenchSegmentFailure,
        ErrorKind::BenchEmptyBody,
    ];

    /// Whether a channel failing this way counts as unreachable.
    pub fn is_bench(self) -> bool {
        matches!(
            self,
            ErrorKind::BenchManifestFailure | ErrorKind::BenchSegmentFailure | ErrorKind::BenchEmptyBody
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedSeed => "malformed_seed",
            ErrorKind::ProbeFailure => "probe_failure",
            ErrorKind::ListingFetchFailure => "listing_fetch_failure",
            ErrorKind::ListingParseFailure => "listing_parse_failure",
            ErrorKind::BenchManifestFailure => "bench_manifest_failure",
            ErrorKind::BenchSegmentFailure => "bench_segment_failure",
            ErrorKind::BenchEmptyBody => "bench_empty_body",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
