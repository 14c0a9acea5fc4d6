//! Discovery phase: candidate generation, liveness probing and listing fetch.
//!
//! This module provides:
//! - [`CandidateGenerator`]: seed normalization and /24 sweep
//! - [`LivenessProber`]: gated GET probes with per-probe timeouts
//! - [`ListingFetcher`]: listing retrieval and parsing under the same gate

pub mod candidate;
pub mod listing;
pub mod prober;

pub use candidate::CandidateGenerator;
pub use listing::ListingFetcher;
pub use prober::LivenessProber;
