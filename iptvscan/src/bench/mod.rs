//! Throughput bench: per-channel speed measurement on a worker pool.

pub mod throughput;
pub mod worker;

pub use throughput::{SpeedClamp, ThroughputBench};
pub use worker::{BenchFailure, BenchPool};
