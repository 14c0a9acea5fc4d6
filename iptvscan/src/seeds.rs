//! Seed sources: seed files and harvesting seeds from published playlists.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use url::{Host, Url};

use iptvscan_protocol::SeedAddress;

use crate::transport::{get_within, HttpTransport};

/// Marker a playlist line must contain to be considered.
const STREAM_MARKER: &str = ",http";
/// Path fragment identifying streams served by a listing server.
const TSFILE_MARKER: &str = "/tsfile/";

/// Non-empty lines that are not `#` comments, trimmed.
pub fn significant_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One seed entry. A bare `host:port` gets an `http://` prefix.
pub fn seed_entry(entry: &str) -> SeedAddress {
    let entry = entry.trim();
    if entry.contains("://") {
        SeedAddress::new(entry)
    } else {
        SeedAddress::new(format!("http://{}", entry))
    }
}

/// Parse seed file contents.
pub fn parse_seed_lines(text: &str) -> Vec<SeedAddress> {
    significant_lines(text).map(seed_entry).collect()
}

pub fn load_seed_file(path: &Path) -> io::Result<Vec<SeedAddress>> {
    let text = fs::read_to_string(path)?;
    let seeds = parse_seed_lines(&text);
    info!("Loaded {} seeds from {}", seeds.len(), path.display());
    Ok(seeds)
}

/// Source page URLs, one per line.
pub fn load_source_list(path: &Path) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(significant_lines(&text).map(str::to_string).collect())
}

/// Write seeds one per line.
pub fn write_seed_file(path: &Path, seeds: &BTreeSet<String>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut text = String::new();
    for seed in seeds {
        text.push_str(seed);
        text.push('\n');
    }
    fs::write(path, text)
}

/// Whether the authority of `url` spells out a port.
fn has_explicit_port(url: &str) -> bool {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    authority
        .rsplit_once(':')
        .map(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Block seed for one playlist line, `http://a.b.c.1:port`.
pub fn seed_from_line(line: &str) -> Option<String> {
    let line = line.trim();
    if !line.contains(STREAM_MARKER) || !line.contains(TSFILE_MARKER) {
        return None;
    }
    let (_, url_part) = line.split_once(',')?;
    let url_part = url_part.trim();
    if !has_explicit_port(url_part) {
        return None;
    }

    let parsed = Url::parse(url_part).ok()?;
    let ip: Ipv4Addr = match parsed.host()? {
        Host::Ipv4(ip) => ip,
        _ => return None,
    };
    let port = parsed.port_or_known_default()?;

    let [a, b, c, _] = ip.octets();
    Some(format!("http://{}.{}.{}.1:{}", a, b, c, port))
}

/// Sorted, deduplicated seeds found in one playlist body.
pub fn extract_seeds(body: &str) -> BTreeSet<String> {
    body.lines().filter_map(seed_from_line).collect()
}

/// Fetches published playlists and extracts listing-server seeds from them.
pub struct SeedHarvester {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl SeedHarvester {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Harvest every source. A failing source is logged and skipped.
    pub async fn harvest(&self, sources: &[String]) -> BTreeSet<String> {
        let mut seeds = BTreeSet::new();
        for source in sources {
            let response = match get_within(self.transport.as_ref(), source, self.timeout)
                .await
                .and_then(|r| r.require_success())
            {
                Ok(response) => response,
                Err(e) => {
                    warn!("Failed to fetch source {}: {}", source, e);
                    continue;
                }
            };

            let found = extract_seeds(&response.text());
            debug!("{} seeds from {}", found.len(), source);
            seeds.extend(found);
        }
        info!("Harvested {} distinct seeds from {} sources", seeds.len(), sources.len());
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;

    #[test]
    fn test_parse_seed_lines() {
        let seeds = parse_seed_lines(
            "# seeds\n\nhttp://10.0.0.5:8080\n  172.16.3.9:8888  \nhttps://1.2.3.4:443/\n",
        );
        let seeds: Vec<_> = seeds.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            seeds,
            vec!["http://10.0.0.5:8080", "http://172.16.3.9:8888", "https://1.2.3.4:443/"]
        );
    }

    #[test]
    fn test_seed_from_line() {
        assert_eq!(
            seed_from_line("CCTV1,http://58.19.38.162:9901/tsfile/live/0001_1.m3u8"),
            Some("http://58.19.38.1:9901".to_string())
        );
        assert_eq!(
            seed_from_line("CCTV1,http://10.1.2.3:80/tsfile/live/1.m3u8"),
            Some("http://10.1.2.1:80".to_string())
        );
        // No explicit port.
        assert_eq!(seed_from_line("CCTV1,http://10.1.2.3/tsfile/live/1.m3u8"), None);
        // Not IPv4.
        assert_eq!(seed_from_line("CCTV1,http://cdn.example:8080/tsfile/1.m3u8"), None);
        // Missing markers.
        assert_eq!(seed_from_line("CCTV1,http://10.1.2.3:8080/hls/1.m3u8"), None);
        assert_eq!(seed_from_line("http://10.1.2.3:8080/tsfile/1.m3u8"), None);
    }

    #[test]
    fn test_extract_seeds_sorted_and_deduplicated() {
        let body = "\
CCTV1,http://10.1.2.3:8080/tsfile/live/1.m3u8
CCTV2,http://10.1.2.77:8080/tsfile/live/2.m3u8
湖南卫视,http://10.0.9.3:9901/tsfile/live/3.m3u8
央视频道,#genre#
";
        let seeds: Vec<_> = extract_seeds(body).into_iter().collect();
        assert_eq!(seeds, vec!["http://10.0.9.1:9901", "http://10.1.2.1:8080"]);
    }

    #[tokio::test]
    async fn test_harvest_skips_failing_sources() {
        let transport = FakeTransport::new()
            .respond(
                "http://pages/a.txt",
                200,
                "CCTV1,http://10.1.2.3:8080/tsfile/live/1.m3u8\n",
            )
            .respond("http://pages/b.txt", 503, "");
        let harvester = SeedHarvester::new(Arc::new(transport), Duration::from_millis(100));

        let seeds = harvester
            .harvest(&[
                "http://pages/a.txt".to_string(),
                "http://pages/b.txt".to_string(),
                "http://pages/missing.txt".to_string(),
            ])
            .await;

        assert_eq!(seeds.into_iter().collect::<Vec<_>>(), vec!["http://10.1.2.1:8080"]);
    }

    #[test]
    fn test_seed_file_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("iptvscan-seeds-{}", std::process::id()))
            .join("seeds.txt");
        let seeds: BTreeSet<String> = ["http://10.1.2.1:8080".to_string()].into_iter().collect();

        write_seed_file(&path, &seeds).unwrap();
        let loaded = load_seed_file(&path).unwrap();
        assert_eq!(loaded, vec![SeedAddress::new("http://10.1.2.1:8080")]);

        if let Some(parent) = path.parent() {
            fs::remove_dir_all(parent).unwrap();
        }
    }
}
