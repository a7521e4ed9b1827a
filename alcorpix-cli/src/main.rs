//! alcorpix: command-line front end.
//!
//! Calibrates the TDCs of one channel from a periodic pulse run, measures
//! consecutive-hit intervals and correlates two channels.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use alcorpix_alcor::ChipConfig;
use alcorpix_algorithms::{
    calibrate, collect_hits, correlate, measure_intervals, CollectConfig, CorrelationConfig,
    FitConfig, IntervalConfig, SimplexMinimizer,
};
use alcorpix_core::{CorrectionParameters, HitRecord, RecordBatch, RecordType};
use alcorpix_io::{read_records, HistogramWriter, ParameterStore};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    AlcorpixIo(#[from] alcorpix_io::Error),

    #[error("{0}")]
    Core(#[from] alcorpix_core::Error),

    #[error("chip configuration: {0}")]
    Chip(#[from] alcorpix_alcor::Error),
}

/// TDC calibration and timing correlation for ALCOR hit streams.
#[derive(Parser)]
#[command(name = "alcorpix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Chip configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    chip_config: Option<PathBuf>,

    /// Group holding the hit table in HDF5 inputs
    #[arg(long, global = true, default_value = "alcor")]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

/// Histogram binning overrides.
#[derive(Args, Debug, Clone, Copy)]
struct Binning {
    /// Number of bins
    #[arg(long)]
    bins: Option<usize>,

    /// Lower histogram edge (clock cycles)
    #[arg(long, allow_hyphen_values = true)]
    min: Option<f64>,

    /// Upper histogram edge (clock cycles)
    #[arg(long, allow_hyphen_values = true)]
    max: Option<f64>,
}

impl Binning {
    fn resolve(self, bins: usize, min: f64, max: f64) -> (usize, f64, f64) {
        (
            self.bins.unwrap_or(bins),
            self.min.unwrap_or(min),
            self.max.unwrap_or(max),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the TDC correction constants of one channel
    Calibrate {
        /// Input hit table
        input: PathBuf,

        /// Channel to calibrate (column * 4 + pixel)
        #[arg(short, long)]
        channel: u32,

        /// Output parameter store (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Write the residual histogram at the best fit here
        #[arg(long)]
        histogram: Option<PathBuf>,

        /// Maximum minimizer iterations
        #[arg(long, default_value = "20000")]
        max_iterations: usize,

        /// Minimizer convergence tolerance
        #[arg(long, default_value = "1e-10")]
        tolerance: f64,
    },

    /// Histogram the interval between consecutive hits of one channel
    Deltat {
        /// Input hit table
        input: PathBuf,

        /// Channel to measure
        #[arg(short, long)]
        channel: u32,

        /// Parameter store with the channel calibration; uncorrected if omitted
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Output histogram (.csv, .json or .h5)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        binning: Binning,
    },

    /// Correlate hit times of a target channel with a reference channel
    Correlate {
        /// Input hit table of the reference channel
        input: PathBuf,

        /// Input hit table of the target channel; defaults to the reference input
        #[arg(long)]
        target_input: Option<PathBuf>,

        /// Reference channel
        #[arg(long)]
        reference: u32,

        /// Target channel
        #[arg(long)]
        target: u32,

        /// Parameter store for the reference channel
        #[arg(long)]
        reference_calibration: Option<PathBuf>,

        /// Parameter store for the target channel
        #[arg(long)]
        target_calibration: Option<PathBuf>,

        /// Drop target hits within the dead time of the previous target hit
        #[arg(long)]
        afterpulse_suppression: bool,

        /// Output histograms (.csv, .json or .h5)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        binning: Binning,
    },

    /// Show record counts of a hit table
    Info {
        /// Input hit table
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let chip = match &cli.chip_config {
        Some(path) => ChipConfig::from_file(path)?,
        None => ChipConfig::default(),
    };

    match cli.command {
        Commands::Calibrate {
            input,
            channel,
            output,
            histogram,
            max_iterations,
            tolerance,
        } => {
            let records = load_records(&input, &cli.table, channel)?;
            let minimizer = SimplexMinimizer::new()
                .with_max_iterations(max_iterations)
                .with_tolerance(tolerance);

            let start = Instant::now();
            let result = calibrate(&records, channel, &chip, &FitConfig::default(), &minimizer)?;
            log::debug!("fit took {:.2}s", start.elapsed().as_secs_f64());

            for (name, value, error) in result.parameters.named() {
                println!("{:<8} {:>14.6} +/- {:.6}", name, value, error);
            }
            println!("sigma    {:>14.4} ns", result.sigma_ns);
            if !result.converged {
                log::warn!("fit did not converge; parameters are the best point reached");
            }

            ParameterStore::new(&output).save(&result.parameters)?;
            if let Some(path) = histogram {
                HistogramWriter::write(path, &[&result.residuals])?;
            }
        }

        Commands::Deltat {
            input,
            channel,
            calibration,
            output,
            binning,
        } => {
            let params = load_calibration(calibration.as_deref())?;
            let records = load_records(&input, &cli.table, channel)?;

            let defaults = IntervalConfig::default();
            let (bins, min, max) = binning.resolve(defaults.bins, defaults.min, defaults.max);
            let config = defaults.with_binning(bins, min, max);

            let hist = measure_intervals(&records, channel, &params, &config)?;
            println!("Intervals: {}", hist.entries());
            HistogramWriter::write(&output, &[&hist])?;
        }

        Commands::Correlate {
            input,
            target_input,
            reference,
            target,
            reference_calibration,
            target_calibration,
            afterpulse_suppression,
            output,
            binning,
        } => {
            let reference_params = load_calibration(reference_calibration.as_deref())?;
            let target_params = load_calibration(target_calibration.as_deref())?;
            let reference_batch = read_records(&input, &cli.table)?;
            let reference_records = reference_batch.channel_records(reference)?;
            let target_records = match &target_input {
                Some(path) => load_records(path, &cli.table, target)?,
                None => reference_batch.channel_records(target)?,
            };

            let (reference_hits, _) = collect_hits(
                reference_records,
                &reference_params,
                &CollectConfig::new(reference),
                &chip,
            );
            let target_config =
                CollectConfig::new(target).with_afterpulse_suppression(afterpulse_suppression);
            let (target_hits, target_stats) =
                collect_hits(target_records, &target_params, &target_config, &chip);
            if afterpulse_suppression {
                log::info!("afterpulse suppression removed {} target hits", target_stats.suppressed);
            }

            let defaults = CorrelationConfig::default();
            let (bins, min, max) = binning.resolve(defaults.bins, defaults.min, defaults.max);
            let config = defaults.with_binning(bins, min, max);

            let result = correlate(&reference_hits, &target_hits, &config, chip.frame_width)?;
            println!("Triggers: {}", result.triggers);
            println!("Matches: {}", result.matches);
            HistogramWriter::write(&output, &[&result.raw, &result.corrected])?;
        }

        Commands::Info { input } => {
            let batch = read_records(&input, &cli.table)?;
            println!("File: {}", input.display());
            println!("Entries: {}", batch.len());

            let mut by_type: BTreeMap<i32, usize> = BTreeMap::new();
            for code in &batch.record_type {
                *by_type.entry(*code).or_default() += 1;
            }
            for (code, count) in &by_type {
                match RecordType::from_code(*code) {
                    RecordType::Other(_) => println!("  unknown ({}): {}", code, count),
                    kind => println!("  {:?} ({}): {}", kind, code, count),
                }
            }

            let summary = summarize(&batch);
            println!("Completed spills: {}", summary.completed_spills);
            println!("Channels with hits: {}", summary.channel_hits.len());
            for (channel, hits) in &summary.channel_hits {
                println!("  channel {:>3}: {} hits", channel, hits);
            }
        }
    }

    Ok(())
}

fn load_records(path: &Path, table: &str, channel: u32) -> Result<Vec<HitRecord>> {
    let batch = read_records(path, table)?;
    Ok(batch.channel_records(channel)?)
}

fn load_calibration(path: Option<&Path>) -> Result<CorrectionParameters> {
    match path {
        Some(path) => {
            let params = ParameterStore::new(path).load_correction()?;
            log::debug!("loaded calibration from {}", path.display());
            Ok(params)
        }
        None => Ok(CorrectionParameters::identity()),
    }
}

/// Spill and channel counts of a stream, read without validation.
struct StreamSummary {
    completed_spills: usize,
    channel_hits: BTreeMap<i64, usize>,
}

fn summarize(batch: &RecordBatch) -> StreamSummary {
    let mut in_spill = false;
    let mut summary = StreamSummary {
        completed_spills: 0,
        channel_hits: BTreeMap::new(),
    };
    for row in batch.rows() {
        match RecordType::from_code(row.record_type) {
            RecordType::StartSpill => in_spill = true,
            RecordType::EndSpill => {
                if in_spill {
                    summary.completed_spills += 1;
                }
                in_spill = false;
            }
            RecordType::AlcorHit => *summary.channel_hits.entry(row.channel()).or_default() += 1,
            RecordType::TriggerTag | RecordType::Other(_) => {}
        }
    }
    summary
}
