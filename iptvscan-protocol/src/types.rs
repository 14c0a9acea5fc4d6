//! Record types flowing through the discovery pipeline.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::codec::PayloadFormat;

/// Values swept through the host-identifying octet of a seed.
pub const SWEEP_OCTETS: RangeInclusive<u16> = 1..=255;

/// Divisor turning a byte rate into MB/s.
pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// An externally supplied `scheme://ip:port` seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedAddress(pub String);

impl SeedAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A listing path appended to every swept host, with the payload shape it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEndpoint {
    pub path: String,
    #[serde(default)]
    pub format: PayloadFormat,
}

impl ListingEndpoint {
    pub fn new(path: impl Into<String>, format: PayloadFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Listing paths probed when nothing is configured.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("/iptv/live/1000.json?key=txiptv", PayloadFormat::Json),
            Self::new("/ZHGXTV/Public/json/live_interface.txt", PayloadFormat::Lines),
        ]
    }
}

/// A generated probe URL, not yet known to be reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateEndpoint {
    pub url: String,
    pub format: PayloadFormat,
}

/// A candidate that answered its probe with a success status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveEndpoint {
    pub url: String,
    pub format: PayloadFormat,
}

impl From<CandidateEndpoint> for LiveEndpoint {
    fn from(candidate: CandidateEndpoint) -> Self {
        Self {
            url: candidate.url,
            format: candidate.format,
        }
    }
}

/// A `(name, url)` pair harvested from a listing.
///
/// The same type carries the raw name straight out of the payload and,
/// after canonicalization, the canonical name. Equality and hashing cover
/// both fields, which is what deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    pub url: String,
}

impl ChannelRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Result of a successful throughput measurement. `speed_mb_s` is already clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    pub name: String,
    pub url: String,
    pub speed_mb_s: f64,
}

impl SpeedSample {
    pub fn new(record: ChannelRecord, speed_mb_s: f64) -> Self {
        Self {
            name: record.name,
            url: record.url,
            speed_mb_s,
        }
    }
}

/// A sample that survived categorization and per-name capping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub category: Category,
    pub name: String,
    pub url: String,
    pub speed_mb_s: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_covers_255_octets() {
        assert_eq!(SWEEP_OCTETS.count(), 255);
        assert_eq!(*SWEEP_OCTETS.start(), 1);
        assert_eq!(*SWEEP_OCTETS.end(), 255);
    }

    #[test]
    fn test_live_endpoint_from_candidate() {
        let candidate = CandidateEndpoint {
            url: "http://10.0.0.7:8080/list.txt".to_string(),
            format: PayloadFormat::Lines,
        };
        let live = LiveEndpoint::from(candidate);
        assert_eq!(live.url, "http://10.0.0.7:8080/list.txt");
        assert_eq!(live.format, PayloadFormat::Lines);
    }

    #[test]
    fn test_default_listing_endpoints() {
        let defaults = ListingEndpoint::defaults();
        assert_eq!(defaults.len(), 2);
        assert_eq!(defaults[0].format, PayloadFormat::Json);
        assert_eq!(defaults[1].format, PayloadFormat::Lines);
    }
}
