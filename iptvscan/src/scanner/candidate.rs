//! Candidate endpoint generation from seed addresses.
//!
//! A seed `http://a.b.c.d:port` stands for the whole `a.b.c.0/24` block.
//! Seeds are first normalized to `a.b.c.1` so that two seeds from the same
//! block expand only once, then the host octet is swept over 1..=255 and
//! every listing path is appended.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use iptvscan_protocol::{CandidateEndpoint, ListingEndpoint, ScanError, SeedAddress, SWEEP_OCTETS};

/// A validated seed reduced to its network block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedSeed {
    pub scheme: String,
    /// First three octets of the IPv4 address.
    pub network: [u8; 3],
    pub port: u16,
}

impl NormalizedSeed {
    /// Parse `scheme://a.b.c.d:port[/...]`. Anything after the port is ignored.
    pub fn parse(seed: &str) -> Result<Self, ScanError> {
        let seed = seed.trim();
        let (scheme, rest) = seed
            .split_once("://")
            .ok_or_else(|| ScanError::malformed_seed(seed, "missing scheme separator '//'"))?;

        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ScanError::malformed_seed(
                seed,
                format!("unsupported scheme '{}'", scheme),
            ));
        }

        let authority = rest.split('/').next().unwrap_or(rest);
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| ScanError::malformed_seed(seed, "missing ':port'"))?;

        let port: u16 = port
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ScanError::malformed_seed(seed, format!("invalid port '{}'", port)))?;

        let octets: Vec<&str> = host.split('.').collect();
        if octets.len() != 4 {
            return Err(ScanError::malformed_seed(
                seed,
                format!("host '{}' is not a 4-segment IPv4 address", host),
            ));
        }
        let mut network = [0u8; 3];
        for (i, octet) in octets.iter().enumerate() {
            let value = parse_octet(octet).ok_or_else(|| {
                ScanError::malformed_seed(seed, format!("invalid octet '{}' in host '{}'", octet, host))
            })?;
            if i < 3 {
                network[i] = value;
            }
        }

        Ok(Self {
            scheme,
            network,
            port,
        })
    }

    /// Probe URL for host octet `host` with `path` appended.
    fn url_for(&self, host: u16, path: &str) -> String {
        let [a, b, c] = self.network;
        let separator = if path.starts_with('/') || path.is_empty() { "" } else { "/" };
        format!(
            "{}://{}.{}.{}.{}:{}{}{}",
            self.scheme, a, b, c, host, self.port, separator, path
        )
    }

    /// All 255 candidates of this block for one listing endpoint.
    pub fn expand(&self, listing: &ListingEndpoint) -> Vec<CandidateEndpoint> {
        SWEEP_OCTETS
            .map(|host| CandidateEndpoint {
                url: self.url_for(host, &listing.path),
                format: listing.format,
            })
            .collect()
    }
}

impl fmt::Display for NormalizedSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.network;
        write!(f, "{}://{}.{}.{}.1:{}", self.scheme, a, b, c, self.port)
    }
}

fn parse_octet(octet: &str) -> Option<u8> {
    if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    octet.parse().ok()
}

/// Candidates produced from a seed list.
#[derive(Debug, Default)]
pub struct CandidateBatch {
    pub candidates: Vec<CandidateEndpoint>,
    /// Distinct network blocks expanded.
    pub blocks: Vec<NormalizedSeed>,
    pub malformed: Vec<ScanError>,
}

/// Expands seeds into probe URLs for every configured listing endpoint.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    listings: Vec<ListingEndpoint>,
}

impl CandidateGenerator {
    pub fn new(listings: Vec<ListingEndpoint>) -> Self {
        Self { listings }
    }

    /// Normalize, deduplicate by network block, and expand.
    ///
    /// Malformed seeds contribute nothing and are returned for counting.
    pub fn generate(&self, seeds: &[SeedAddress]) -> CandidateBatch {
        let mut batch = CandidateBatch::default();
        let mut seen = HashSet::new();

        for seed in seeds {
            match NormalizedSeed::parse(seed.as_str()) {
                Ok(normalized) => {
                    if seen.insert(normalized.clone()) {
                        batch.blocks.push(normalized);
                    } else {
                        debug!("Seed {} collapses into an already queued block", seed);
                    }
                }
                Err(e) => {
                    debug!("{}", e);
                    batch.malformed.push(e);
                }
            }
        }

        for block in &batch.blocks {
            for listing in &self.listings {
                batch.candidates.extend(block.expand(listing));
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iptvscan_protocol::{ErrorKind, PayloadFormat};

    fn json_listing() -> ListingEndpoint {
        ListingEndpoint::new("/iptv/live/1000.json?key=txiptv", PayloadFormat::Json)
    }

    fn seeds(list: &[&str]) -> Vec<SeedAddress> {
        list.iter().map(|s| SeedAddress::new(*s)).collect()
    }

    #[test]
    fn test_expand_produces_255_candidates() {
        let generator = CandidateGenerator::new(vec![json_listing()]);
        let batch = generator.generate(&seeds(&["http://10.0.0.5:8080"]));

        assert_eq!(batch.candidates.len(), 255);
        assert!(batch.malformed.is_empty());
        assert_eq!(
            batch.candidates[0].url,
            "http://10.0.0.1:8080/iptv/live/1000.json?key=txiptv"
        );
        assert_eq!(
            batch.candidates[254].url,
            "http://10.0.0.255:8080/iptv/live/1000.json?key=txiptv"
        );
        assert!(batch
            .candidates
            .iter()
            .all(|c| c.url.starts_with("http://10.0.0.") && c.format == PayloadFormat::Json));
    }

    #[test]
    fn test_same_block_seeds_collapse() {
        let generator = CandidateGenerator::new(vec![json_listing()]);
        let batch = generator.generate(&seeds(&[
            "http://10.0.0.5:8080",
            "http://10.0.0.77:8080/",
            "http://10.0.0.5:9090",
        ]));

        assert_eq!(batch.blocks.len(), 2);
        assert_eq!(batch.blocks[0].to_string(), "http://10.0.0.1:8080");
        assert_eq!(batch.candidates.len(), 510);
    }

    #[test]
    fn test_malformed_seeds_are_counted_not_expanded() {
        let generator = CandidateGenerator::new(vec![json_listing()]);
        let batch = generator.generate(&seeds(&[
            "10.0.0.5:8080",
            "http://10.0.0.5",
            "http://10.0.5:8080",
            "http://10.0.0.300:8080",
            "http://host.example:8080",
            "ftp://10.0.0.5:21",
            "http://10.0.0.5:http",
            "http://172.16.3.9:8888",
        ]));

        assert_eq!(batch.malformed.len(), 7);
        assert!(batch
            .malformed
            .iter()
            .all(|e| e.kind() == ErrorKind::MalformedSeed));
        assert_eq!(batch.candidates.len(), 255);
    }

    #[test]
    fn test_multiple_listing_paths() {
        let generator = CandidateGenerator::new(ListingEndpoint::defaults());
        let batch = generator.generate(&seeds(&["https://192.168.1.20:4433"]));
        assert_eq!(batch.candidates.len(), 255 * 2);
        assert!(batch
            .candidates
            .iter()
            .any(|c| c.url == "https://192.168.1.20:4433/ZHGXTV/Public/json/live_interface.txt"));
    }

    #[test]
    fn test_path_without_leading_slash() {
        let seed = NormalizedSeed::parse("http://1.2.3.4:80").unwrap();
        let candidates = seed.expand(&ListingEndpoint::new("list.txt", PayloadFormat::Lines));
        assert_eq!(candidates[0].url, "http://1.2.3.1:80/list.txt");
    }
}
