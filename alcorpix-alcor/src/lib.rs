//! alcorpix-alcor: ALCOR chip timing model and spill handling.
//!
//! This crate holds what is specific to the ALCOR readout:
//!
//! - [`corrected_time`] - per-TDC linear fine-time correction
//! - [`SpillSegmenter`] - splits a record stream into completed spills
//! - [`ConsecutiveHits`] - pairs consecutive hits of one channel, reset at each spill start
//! - [`ChipConfig`] - frame width, dead time and calibration gate constants
//!
//! # Processing Pipeline
//!
//! 1. Validate raw rows into [`HitRecord`]s
//! 2. Segment by spill and filter to a single channel
//! 3. Correct hit times with the channel's calibration

mod error;
pub mod spill;
mod timing;

pub use error::{Error, Result};
pub use spill::{ConsecutiveHits, Spill, SpillSegmenter, SpillState};
pub use timing::{apply_correction, corrected_time};

// Re-export core types for convenience
pub use alcorpix_core::hit::{HitRecord, RecordType};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Chip and analysis constants.
///
/// All times are in coarse clock cycles unless the name says otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    /// Width of a correlation frame.
    pub frame_width: i64,
    /// Minimum spacing between kept hits when afterpulse suppression is on.
    pub dead_time: f64,
    /// Expected raw spacing of consecutive calibration pulses.
    pub nominal_gap: i64,
    /// Accepted deviation of the raw spacing from `nominal_gap`.
    pub gap_tolerance: f64,
    /// Duration of one coarse clock cycle in nanoseconds.
    pub clock_period_ns: f64,
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            frame_width: 256,
            dead_time: 32.0,
            nominal_gap: 320,
            gap_tolerance: 10.0,
            clock_period_ns: 3.125,
        }
    }
}

impl ChipConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the document cannot be parsed or validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every constant is usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.frame_width <= 0 {
            return Err(Error::InvalidConfig(format!(
                "frame_width must be positive, got {}",
                self.frame_width
            )));
        }
        if !(self.dead_time >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "dead_time must be non-negative, got {}",
                self.dead_time
            )));
        }
        if !(self.gap_tolerance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "gap_tolerance must be positive, got {}",
                self.gap_tolerance
            )));
        }
        if !(self.clock_period_ns > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "clock_period_ns must be positive, got {}",
                self.clock_period_ns
            )));
        }
        Ok(())
    }

    /// True if a raw spacing is close enough to the nominal pulse spacing.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn gap_accepted(&self, gap: i64) -> bool {
        ((gap - self.nominal_gap) as f64).abs() < self.gap_tolerance
    }
}
