//! Consecutive-hit interval distribution of a single channel.

use alcorpix_alcor::ConsecutiveHits;
use alcorpix_core::{CorrectionParameters, Histogram1D, HitRecord, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Binning of the interval histogram.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntervalConfig {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge in clock units.
    pub min: f64,
    /// Upper edge in clock units.
    pub max: f64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            bins: 50_000,
            min: 0.0,
            max: 1000.0,
        }
    }
}

impl IntervalConfig {
    /// Sets the histogram binning.
    #[must_use]
    pub fn with_binning(mut self, bins: usize, min: f64, max: f64) -> Self {
        self.bins = bins;
        self.min = min;
        self.max = max;
        self
    }
}

/// Histograms the corrected time between consecutive hits on `channel`.
///
/// The previous hit is forgotten at every spill start; no spill end is
/// required, so a trailing unterminated spill still contributes.
///
/// # Errors
/// Returns [`alcorpix_core::Error::InvalidHistogram`] for a bad binning.
pub fn measure_intervals(
    records: &[HitRecord],
    channel: u32,
    params: &CorrectionParameters,
    config: &IntervalConfig,
) -> Result<Histogram1D> {
    let mut hist = Histogram1D::new("hDeltaT", config.bins, config.min, config.max)?
        .with_title(format!("consecutive-hit interval, channel {channel}"));

    for (previous, hit) in ConsecutiveHits::new(records, channel, params) {
        if let (Some(t0), Some(t1)) = (previous.corrected_time, hit.corrected_time) {
            hist.fill(t1 - t0);
        }
    }

    log::info!(
        "channel {}: {} intervals, {} beyond range",
        channel,
        hist.entries(),
        hist.overflow()
    );
    Ok(hist)
}
