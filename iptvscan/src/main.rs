//! iptvscan: discovers IPTV listing servers and ranks their channels.
//!
//! Seeds name one host per network block. Every block is swept, live
//! listing servers are read, channel names are canonicalized and every
//! channel's first segment is timed. The fastest streams per channel are
//! written out as a categorized playlist.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};

mod bench;
mod canonical;
mod config;
mod dedup;
mod logging;
mod metrics;
mod pipeline;
mod ranker;
mod scanner;
mod seeds;
mod transport;
mod writer;

use config::{ConfigFile, HarvestConfig, HarvestOverrides, ScanConfig, ScanOverrides};
use iptvscan_protocol::SeedAddress;
use pipeline::{PipelineError, ScanPipeline};
use seeds::SeedHarvester;
use transport::{HttpTransport, ReqwestTransport};
use writer::OutputWriter;

/// iptvscan - IPTV listing server discovery and channel speed ranking
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'f', long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value = "7", global = true)]
    log_retention_days: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep seed blocks, benchmark channels and write the playlist (default)
    Scan(ScanArgs),
    /// Extract seeds from published playlists and write a seed file
    Harvest(HarvestArgs),
}

#[derive(clap::Args, Debug, Default)]
struct ScanArgs {
    /// Seed file, one `scheme://ip:port` per line
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    /// Seed address; may be repeated
    #[arg(long = "seed")]
    seed: Vec<String>,

    /// Directory for speed_results.txt and itvlist.txt
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Probe timeout in seconds
    #[arg(long)]
    probe_timeout: Option<f64>,

    /// Listing fetch timeout in seconds
    #[arg(long)]
    fetch_timeout: Option<f64>,

    /// Manifest and segment timeout in seconds
    #[arg(long)]
    bench_timeout: Option<f64>,

    /// Maximum outstanding discovery requests
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Bench worker count
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Rows kept per channel name
    #[arg(short = 'k', long)]
    per_name_cap: Option<usize>,

    /// Lower speed clamp in MB/s
    #[arg(long)]
    min_speed: Option<f64>,

    /// Upper speed clamp in MB/s
    #[arg(long)]
    max_speed: Option<f64>,

    /// UTC offset in hours for section timestamps
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<i32>,
}

impl ScanArgs {
    fn overrides(&self) -> ScanOverrides {
        ScanOverrides {
            probe_timeout_secs: self.probe_timeout,
            fetch_timeout_secs: self.fetch_timeout,
            bench_timeout_secs: self.bench_timeout,
            concurrency: self.concurrency,
            workers: self.workers,
            per_name_cap: self.per_name_cap,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            utc_offset_hours: self.utc_offset,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
struct HarvestArgs {
    /// File listing source playlist URLs, one per line
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Source playlist URL; may be repeated
    #[arg(long = "source")]
    source: Vec<String>,

    /// Seed file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-source fetch timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,
}

impl HarvestArgs {
    fn overrides(&self) -> HarvestOverrides {
        HarvestOverrides {
            sources_file: self.sources.clone(),
            sources: self.source.clone(),
            output: self.output.clone(),
            timeout_secs: self.timeout,
        }
    }
}

/// Seeds from the command line, or from the config file when none are given.
fn collect_seeds(args: &ScanArgs, file_config: &ConfigFile) -> Result<Vec<SeedAddress>, PipelineError> {
    let mut collected = Vec::new();

    let seeds_file = args.seeds.clone().or_else(|| {
        if args.seed.is_empty() {
            file_config.scan.seeds_file.clone()
        } else {
            None
        }
    });
    if let Some(path) = seeds_file {
        let loaded = seeds::load_seed_file(&path).map_err(|source| PipelineError::Input {
            path: path.clone(),
            source,
        })?;
        collected.extend(loaded);
    }

    if !args.seed.is_empty() {
        collected.extend(args.seed.iter().map(|s| seeds::seed_entry(s)));
    } else if args.seeds.is_none() {
        let inline = file_config.scan.seeds.iter().flatten();
        collected.extend(inline.map(|s| seeds::seed_entry(s)));
    }

    Ok(collected)
}

async fn run_scan(args: ScanArgs, file_config: ConfigFile) -> Result<(), PipelineError> {
    let config = ScanConfig::resolve(&file_config, &args.overrides())?;
    let seeds = collect_seeds(&args, &file_config)?;
    if seeds.is_empty() {
        return Err(PipelineError::EmptySeedList);
    }

    info!("iptvscan starting...");
    info!("  Seeds: {}", seeds.len());
    info!("  Listing paths: {}", config.listings.len());
    info!("  Concurrency: {}  Workers: {}  Cap: {}", config.concurrency, config.workers, config.per_name_cap);
    info!(
        "  Timeouts: probe {:?}, fetch {:?}, bench {:?}",
        config.probe_timeout, config.fetch_timeout, config.bench_timeout
    );
    info!("  Output: {}", config.output_dir.display());

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let pipeline = ScanPipeline::new(config, transport)?;
    let output = pipeline.run(&seeds).await?;

    let writer = OutputWriter::new(&pipeline.config().output_dir);
    let written = writer
        .write(&output.playlist)
        .map_err(|source| PipelineError::Output {
            path: writer.dir().to_path_buf(),
            source,
        })?;
    info!("  Speed results: {}", written.speed_results.display());
    info!("  Playlist: {}", written.playlist.display());

    for failure in &output.unreachable {
        debug!("Unreachable: {} {} ({})", failure.record.name, failure.record.url, failure.error);
    }
    if !output.unreachable.is_empty() {
        warn!("{} channels were unreachable", output.unreachable.len());
    }
    output.report.log_summary();
    Ok(())
}

async fn run_harvest(args: HarvestArgs, file_config: ConfigFile) -> Result<(), PipelineError> {
    let config = HarvestConfig::resolve(&file_config, &args.overrides())?;

    let mut sources = Vec::new();
    if let Some(path) = &config.sources_file {
        let listed = seeds::load_source_list(path).map_err(|source| PipelineError::Input {
            path: path.clone(),
            source,
        })?;
        sources.extend(listed);
    }
    sources.extend(config.sources.iter().cloned());
    if sources.is_empty() {
        return Err(PipelineError::EmptySourceList);
    }

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let harvested = SeedHarvester::new(transport, config.timeout)
        .harvest(&sources)
        .await;

    seeds::write_seed_file(&config.output, &harvested).map_err(|source| PipelineError::Output {
        path: config.output.clone(),
        source,
    })?;
    info!("Wrote {} seeds to {}", harvested.len(), config.output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let file_config = match config::locate_config(args.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ConfigFile::default(),
    };

    // Merge logging configs (command line takes precedence)
    let log_dir = if args.log_dir.to_string_lossy() != "logs" {
        args.log_dir.clone()
    } else {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    };

    let log_retention_days = if args.log_retention_days != 7 {
        args.log_retention_days
    } else {
        file_config.logging.retention_days.unwrap_or(7)
    };

    let log_level = file_config.logging.level.clone();
    if let Err(e) = logging::init_logging(&log_dir, log_retention_days, args.verbose, log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match args.command {
        Some(Command::Harvest(harvest)) => run_harvest(harvest, file_config).await,
        Some(Command::Scan(scan)) => run_scan(scan, file_config).await,
        None => run_scan(ScanArgs::default(), file_config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_arguments() {
        let args = Args::parse_from([
            "iptvscan",
            "scan",
            "--seed",
            "http://10.0.0.5:8080",
            "--seed",
            "172.16.3.9:8888",
            "-c",
            "50",
            "--utc-offset",
            "-5",
        ]);
        let Some(Command::Scan(scan)) = args.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.seed.len(), 2);
        assert_eq!(scan.concurrency, Some(50));
        assert_eq!(scan.utc_offset, Some(-5));

        let seeds = collect_seeds(&scan, &ConfigFile::default()).unwrap();
        assert_eq!(seeds[1].as_str(), "http://172.16.3.9:8888");
    }

    #[test]
    fn test_file_seeds_used_without_cli_seeds() {
        let file = config::parse_config("[scan]\nseeds = [\"10.1.1.1:80\"]\n").unwrap();
        let seeds = collect_seeds(&ScanArgs::default(), &file).unwrap();
        assert_eq!(seeds, vec![SeedAddress::new("http://10.1.1.1:80")]);

        let cli = ScanArgs {
            seed: vec!["http://10.2.2.2:80".to_string()],
            ..Default::default()
        };
        let seeds = collect_seeds(&cli, &file).unwrap();
        assert_eq!(seeds, vec![SeedAddress::new("http://10.2.2.2:80")]);
    }

    #[test]
    fn test_default_command_is_scan() {
        let args = Args::parse_from(["iptvscan", "--verbose"]);
        assert!(args.command.is_none());
        assert!(args.verbose);
    }

    #[test]
    fn test_missing_seed_file_is_input_error() {
        let cli = ScanArgs {
            seeds: Some(PathBuf::from("/nonexistent/iptvscan-seeds.txt")),
            ..Default::default()
        };
        assert!(matches!(
            collect_seeds(&cli, &ConfigFile::default()),
            Err(PipelineError::Input { .. })
        ));
    }
}
