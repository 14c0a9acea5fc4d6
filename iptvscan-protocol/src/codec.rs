//! Channel-list payload and stream manifest parsing.
//!
//! Nothing here performs I/O. Callers hand in the body they fetched and the
//! URL they fetched it from; relative channel URLs are resolved against that
//! URL's origin (scheme, host and port), never against the listing path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ScanError;
use crate::types::ChannelRecord;

/// Substrings marking a line as an unsupported transport (raw multicast relays).
pub const UNSUPPORTED_TRANSPORT_MARKERS: &[&str] = &["udp", "rtp"];

/// Comment marker shared by line listings and HLS manifests.
pub const COMMENT_MARKER: char = '#';

/// Shape of a listing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Detect from the body.
    #[default]
    Auto,
    /// `{"data": [{"name": .., "url": ..}]}` or a bare array of such records.
    Json,
    /// One `name,url` pair per line.
    Lines,
    /// Extended M3U (`#EXTINF:...,name` followed by the url line).
    M3u,
}

impl PayloadFormat {
    /// Resolve `Auto` by looking at the body.
    pub fn detect(self, body: &str) -> PayloadFormat {
        if self != PayloadFormat::Auto {
            return self;
        }
        let trimmed = body.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            PayloadFormat::Json
        } else if trimmed.starts_with("#EXTM3U") {
            PayloadFormat::M3u
        } else {
            PayloadFormat::Lines
        }
    }
}

/// Parse a listing body fetched from `endpoint_url`.
///
/// Records that are incomplete or ambiguous are dropped individually; only a
/// body that cannot be read at all (invalid JSON, unusable endpoint URL)
/// fails the whole listing.
pub fn parse_listing(
    body: &str,
    format: PayloadFormat,
    endpoint_url: &str,
) -> Result<Vec<ChannelRecord>, ScanError> {
    let origin = endpoint_origin(endpoint_url)
        .ok_or_else(|| ScanError::listing_parse(endpoint_url, "endpoint URL has no usable origin"))?;
    let body = body.trim_start_matches('\u{feff}');

    match format.detect(body) {
        PayloadFormat::Json => parse_json(body, &origin, endpoint_url),
        PayloadFormat::M3u => Ok(parse_m3u(body, &origin)),
        PayloadFormat::Lines | PayloadFormat::Auto => Ok(parse_lines(body, &origin)),
    }
}

fn parse_lines(body: &str, origin: &str) -> Vec<ChannelRecord> {
    body.lines()
        .filter(|line| !has_unsupported_transport(line))
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                return None;
            }
            let (name, url) = line.split_once(',')?;
            make_record(name, url, origin)
        })
        .collect()
}

fn parse_m3u(body: &str, origin: &str) -> Vec<ChannelRecord> {
    let mut records = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(info) = line.strip_prefix("#EXTINF:") {
            // Display name follows the last comma outside the attribute list.
            pending_name = info.rsplit_once(',').map(|(_, name)| name.trim().to_string());
            continue;
        }
        if line.starts_with(COMMENT_MARKER) {
            continue;
        }
        if let Some(name) = pending_name.take() {
            if has_unsupported_transport(line) {
                continue;
            }
            if let Some(record) = make_record(&name, line, origin) {
                records.push(record);
            }
        }
    }

    records
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonListing {
    Wrapped {
        #[serde(default)]
        data: Vec<Value>,
    },
    Bare(Vec<Value>),
}

#[derive(Deserialize)]
struct JsonChannel {
    name: Option<String>,
    url: Option<String>,
}

fn parse_json(body: &str, origin: &str, endpoint_url: &str) -> Result<Vec<ChannelRecord>, ScanError> {
    let listing: JsonListing = serde_json::from_str(body)
        .map_err(|e| ScanError::listing_parse(endpoint_url, e.to_string()))?;

    let items = match listing {
        JsonListing::Wrapped { data } => data,
        JsonListing::Bare(items) => items,
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<JsonChannel>(item).ok())
        .filter_map(|item| {
            let name = item.name?;
            let url = item.url?;
            // An embedded comma would corrupt the `name,url` output format.
            if url.contains(',') {
                return None;
            }
            make_record(&name, &url, origin)
        })
        .collect())
}

fn make_record(name: &str, url: &str, origin: &str) -> Option<ChannelRecord> {
    let name = name.trim();
    let url = url.trim();
    if name.is_empty() || url.is_empty() || url.starts_with(COMMENT_MARKER) {
        return None;
    }
    Some(ChannelRecord::new(name, resolve_url(origin, url)))
}

fn has_unsupported_transport(line: &str) -> bool {
    UNSUPPORTED_TRANSPORT_MARKERS
        .iter()
        .any(|marker| line.contains(marker))
}

/// `scheme://host[:port]` of an http(s) URL.
pub fn endpoint_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}

/// Make `url` absolute, treating anything not starting with `http` as origin-relative.
pub fn resolve_url(origin: &str, url: &str) -> String {
    if is_absolute(url) {
        url.to_string()
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Manifest URL with its final path segment removed (trailing `/` kept).
pub fn manifest_base(manifest_url: &str) -> &str {
    let without_query = manifest_url
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(manifest_url);
    match without_query.rfind('/') {
        Some(idx) => &manifest_url[..=idx],
        None => manifest_url,
    }
}

/// First entry referenced by an HLS manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentReference {
    /// A full `http(s)://` URL.
    Absolute(String),
    /// The final path segment of a relative reference.
    Relative(String),
}

impl SegmentReference {
    /// Resolve against the manifest that referenced it.
    pub fn resolve(&self, manifest_url: &str) -> String {
        match self {
            SegmentReference::Absolute(url) => url.clone(),
            SegmentReference::Relative(file) => format!("{}{}", manifest_base(manifest_url), file),
        }
    }

    /// Whether the reference is itself a playlist rather than a media segment.
    pub fn is_playlist(&self) -> bool {
        let raw = match self {
            SegmentReference::Absolute(url) => url.as_str(),
            SegmentReference::Relative(file) => file.as_str(),
        };
        let path = raw.split_once('?').map(|(path, _)| path).unwrap_or(raw);
        path.ends_with(".m3u8") || path.ends_with(".m3u")
    }
}

/// First non-comment, non-empty line of a manifest.
pub fn first_segment_reference(manifest: &str) -> Option<SegmentReference> {
    let line = manifest
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))?;

    if is_absolute(line) {
        return Some(SegmentReference::Absolute(line.to_string()));
    }
    let file = line.rsplit('/').next().unwrap_or(line);
    if file.is_empty() {
        return None;
    }
    Some(SegmentReference::Relative(file.to_string()))
}
