//! Data model and payload formats for the iptvscan discovery pipeline.
//!
//! This crate holds everything that does not perform I/O:
//!
//! - [`types`]: endpoint, channel record and speed sample types
//! - [`error`]: per-item failure taxonomy and error counters
//! - [`codec`]: channel-list payload and stream manifest parsing
//! - [`category`]: output category classification
//!
//! # Listing Payloads
//!
//! Two payload shapes are understood by [`codec::parse_listing`]:
//!
//! ```text
//! Line-delimited:                 Structured:
//! CCTV1综合,http://x/a.m3u8        {"data": [{"name": "CCTV1", "url": "/a.m3u8"}]}
//! cctv2财经,/b.m3u8
//! ```
//!
//! # Example
//!
//! ```rust
//! use iptvscan_protocol::codec::{parse_listing, PayloadFormat};
//! use iptvscan_protocol::category::{Category, CategoryMarkers};
//!
//! let body = "CCTV1,/a.m3u8\n湖南卫视,http://y/b.m3u8\n";
//! let records = parse_listing(body, PayloadFormat::Lines, "http://10.0.0.5:8080/list.txt").unwrap();
//! assert_eq!(records[0].url, "http://10.0.0.5:8080/a.m3u8");
//!
//! let markers = CategoryMarkers::default();
//! assert_eq!(markers.classify(&records[1].name), Some(Category::Regional));
//! ```

pub mod category;
pub mod codec;
pub mod error;
pub mod types;

pub use category::{Category, CategoryMarkers};
pub use codec::{first_segment_reference, parse_listing, PayloadFormat, SegmentReference};
pub use error::{ErrorKind, ScanError};
pub use types::{
    CandidateEndpoint, ChannelRecord, LiveEndpoint, ListingEndpoint, RankedEntry, SeedAddress,
    SpeedSample, BYTES_PER_MEGABYTE, SWEEP_OCTETS,
};
