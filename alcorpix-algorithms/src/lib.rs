//! alcorpix-algorithms: Calibration and correlation algorithms for ALCOR hits.
//!
//! This crate provides:
//! - **Deadtime filter** - greedy afterpulse suppression within a spill
//! - **Frame bucketer** - corrected hits grouped by (spill, window)
//! - **Residual objective** - sum of squared period residuals of consecutive hits
//! - **Calibration fitter** - minimizes the objective with one offset pinned
//! - **Correlator** - reference/target time differences with acceptance correction
//! - **Intervals** - consecutive-hit spacing of a single channel
//!
#![warn(missing_docs)]

mod calibration;
mod collect;
mod correlation;
mod deadtime;
mod interval;
pub mod minimizer;
mod objective;

pub use calibration::{calibrate, CalibrationResult, FitConfig};
pub use collect::{bucket_spill, collect_hits, CollectConfig, CollectStatistics};
pub use correlation::{acceptance, correlate, CorrelationConfig, CorrelationResult};
pub use deadtime::suppress_afterpulses;
pub use interval::{measure_intervals, IntervalConfig};
pub use minimizer::{FitOutcome, Minimizer, SimplexMinimizer};
pub use objective::{Evaluation, ResidualObjective};

// Re-export chip configuration used by every algorithm
pub use alcorpix_alcor::ChipConfig;
