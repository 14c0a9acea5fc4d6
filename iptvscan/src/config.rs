//! Configuration file format and tunable resolution.
//!
//! Values are resolved in this order: command line, then the TOML file,
//! then built-in defaults. The result is validated before any I/O happens.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use iptvscan_protocol::{CategoryMarkers, ListingEndpoint};

use crate::bench::SpeedClamp;

pub const DEFAULT_CONFIG_FILE: &str = "iptvscan.toml";
pub const DEFAULT_PROBE_TIMEOUT_SECS: f64 = 1.5;
pub const DEFAULT_FETCH_TIMEOUT_SECS: f64 = 1.5;
pub const DEFAULT_BENCH_TIMEOUT_SECS: f64 = 1.5;
pub const DEFAULT_CONCURRENCY: usize = 300;
pub const DEFAULT_WORKERS: usize = 15;
pub const DEFAULT_PER_NAME_CAP: usize = 8;
pub const DEFAULT_MIN_SPEED: f64 = 0.001;
pub const DEFAULT_MAX_SPEED: f64 = 100.0;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_HARVEST_OUTPUT: &str = "data/seeds.txt";
pub const DEFAULT_HARVEST_TIMEOUT_SECS: f64 = 10.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Discovery concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Discovery concurrency {value} exceeds the limit of {max}")]
    ConcurrencyTooLarge { value: usize, max: usize },

    #[error("Bench worker count must be at least 1")]
    ZeroWorkers,

    #[error("Per-name cap must be at least 1")]
    ZeroCap,

    #[error("Invalid speed bounds: min={min}, max={max}")]
    InvalidSpeedBounds { min: f64, max: f64 },

    #[error("Invalid {name} timeout: {secs}s")]
    InvalidTimeout { name: &'static str, secs: f64 },

    #[error("Invalid UTC offset: {0} hours")]
    InvalidUtcOffset(i32),

    #[error("No listing endpoints configured")]
    NoListings,
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub bench: BenchSection,
    #[serde(default)]
    pub ranking: RankingSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub harvest: HarvestSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanSection {
    pub seeds_file: Option<PathBuf>,
    pub seeds: Option<Vec<String>>,
    pub probe_timeout_secs: Option<f64>,
    pub fetch_timeout_secs: Option<f64>,
    pub concurrency: Option<usize>,
    pub listings: Option<Vec<ListingEndpoint>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BenchSection {
    pub timeout_secs: Option<f64>,
    pub workers: Option<usize>,
    pub min_speed: Option<f64>,
    pub max_speed: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RankingSection {
    pub per_name_cap: Option<usize>,
    pub utc_offset_hours: Option<i32>,
    pub primary_marker: Option<String>,
    pub regional_marker: Option<String>,
    pub test_marker: Option<String>,
    /// Extra `[from, to]` synonym rules applied after the built-in table.
    pub synonyms: Option<Vec<[String; 2]>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HarvestSection {
    pub sources: Option<Vec<String>>,
    pub sources_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(contents)
}

/// Config file to use: explicit path, else `iptvscan.toml` if present.
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    })
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub probe_timeout_secs: Option<f64>,
    pub fetch_timeout_secs: Option<f64>,
    pub bench_timeout_secs: Option<f64>,
    pub concurrency: Option<usize>,
    pub workers: Option<usize>,
    pub per_name_cap: Option<usize>,
    pub min_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub utc_offset_hours: Option<i32>,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved and validated scan settings.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub bench_timeout: Duration,
    /// Discovery gate size `C`.
    pub concurrency: usize,
    /// Bench pool size `W`.
    pub workers: usize,
    /// Rows kept per `(category, name)`, `K`.
    pub per_name_cap: usize,
    pub speed_clamp: SpeedClamp,
    pub utc_offset: FixedOffset,
    pub listings: Vec<ListingEndpoint>,
    pub markers: CategoryMarkers,
    pub extra_synonyms: Vec<(String, String)>,
    pub output_dir: PathBuf,
}

fn timeout(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::InvalidTimeout { name, secs });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidTimeout { name, secs })
}

fn utc_offset(hours: i32) -> Result<FixedOffset, ConfigError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or(ConfigError::InvalidUtcOffset(hours))
}

impl ScanConfig {
    /// Merge command line, file and defaults, then validate.
    pub fn resolve(file: &ConfigFile, cli: &ScanOverrides) -> Result<Self, ConfigError> {
        let scan = &file.scan;
        let bench = &file.bench;
        let ranking = &file.ranking;

        let probe_timeout = timeout(
            "probe",
            cli.probe_timeout_secs
                .or(scan.probe_timeout_secs)
                .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
        )?;
        let fetch_timeout = timeout(
            "fetch",
            cli.fetch_timeout_secs
                .or(scan.fetch_timeout_secs)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )?;
        let bench_timeout = timeout(
            "bench",
            cli.bench_timeout_secs
                .or(bench.timeout_secs)
                .unwrap_or(DEFAULT_BENCH_TIMEOUT_SECS),
        )?;

        let concurrency = cli.concurrency.or(scan.concurrency).unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ConcurrencyTooLarge {
                value: concurrency,
                max: Semaphore::MAX_PERMITS,
            });
        }
        let workers = cli.workers.or(bench.workers).unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        let per_name_cap = cli
            .per_name_cap
            .or(ranking.per_name_cap)
            .unwrap_or(DEFAULT_PER_NAME_CAP);
        if per_name_cap == 0 {
            return Err(ConfigError::ZeroCap);
        }

        let min = cli.min_speed.or(bench.min_speed).unwrap_or(DEFAULT_MIN_SPEED);
        let max = cli.max_speed.or(bench.max_speed).unwrap_or(DEFAULT_MAX_SPEED);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::InvalidSpeedBounds { min, max });
        }

        let utc_offset = utc_offset(
            cli.utc_offset_hours
                .or(ranking.utc_offset_hours)
                .unwrap_or(DEFAULT_UTC_OFFSET_HOURS),
        )?;

        let listings = scan.listings.clone().unwrap_or_else(ListingEndpoint::defaults);
        if listings.is_empty() {
            return Err(ConfigError::NoListings);
        }

        let defaults = CategoryMarkers::default();
        let markers = CategoryMarkers {
            primary: ranking.primary_marker.clone().unwrap_or(defaults.primary),
            regional: ranking.regional_marker.clone().unwrap_or(defaults.regional),
            test: ranking.test_marker.clone().unwrap_or(defaults.test),
        };

        let extra_synonyms = ranking
            .synonyms
            .iter()
            .flatten()
            .map(|[from, to]| (from.clone(), to.clone()))
            .collect();

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| file.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            probe_timeout,
            fetch_timeout,
            bench_timeout,
            concurrency,
            workers,
            per_name_cap,
            speed_clamp: SpeedClamp::new(min, max),
            utc_offset,
            listings,
            markers,
            extra_synonyms,
            output_dir,
        })
    }
}

/// Command-line values for `harvest`.
#[derive(Debug, Clone, Default)]
pub struct HarvestOverrides {
    pub sources_file: Option<PathBuf>,
    pub sources: Vec<String>,
    pub output: Option<PathBuf>,
    pub timeout_secs: Option<f64>,
}

/// Resolved `harvest` settings.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub sources_file: Option<PathBuf>,
    /// Inline source URLs; the command line replaces the file list.
    pub sources: Vec<String>,
    pub output: PathBuf,
    pub timeout: Duration,
}

impl HarvestConfig {
    pub fn resolve(file: &ConfigFile, cli: &HarvestOverrides) -> Result<Self, ConfigError> {
        let harvest = &file.harvest;
        let sources = if cli.sources.is_empty() {
            harvest.sources.clone().unwrap_or_default()
        } else {
            cli.sources.clone()
        };
        Ok(Self {
            sources_file: cli.sources_file.clone().or_else(|| harvest.sources_file.clone()),
            sources,
            output: cli
                .output
                .clone()
                .or_else(|| harvest.output.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HARVEST_OUTPUT)),
            timeout: timeout(
                "harvest",
                cli.timeout_secs
                    .or(harvest.timeout_secs)
                    .unwrap_or(DEFAULT_HARVEST_TIMEOUT_SECS),
            )?,
        })
    }
}
