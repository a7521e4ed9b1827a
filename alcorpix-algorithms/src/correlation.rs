//! Frame-bucketed time correlation of two channels.

use alcorpix_core::{Histogram1D, HitCollection, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Binning of the time-difference histogram.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationConfig {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge in clock units.
    pub min: f64,
    /// Upper edge in clock units.
    pub max: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            bins: 10_000,
            min: -100.0,
            max: 100.0,
        }
    }
}

impl CorrelationConfig {
    /// Sets the histogram binning.
    #[must_use]
    pub fn with_binning(mut self, bins: usize, min: f64, max: f64) -> Self {
        self.bins = bins;
        self.min = min;
        self.max = max;
        self
    }
}

/// Output of [`correlate`].
#[derive(Debug, Clone)]
pub struct CorrelationResult {
    /// Time differences per trigger.
    pub raw: Histogram1D,
    /// `raw` divided by the frame acceptance.
    pub corrected: Histogram1D,
    /// Reference hits processed.
    pub triggers: u64,
    /// Reference/target pairs filled.
    pub matches: u64,
}

/// Probability that two hits `x` apart share a frame of width `w`.
///
/// Triangular: 1 at `x = 0`, falling linearly to 0 at `|x| = w`.
#[must_use]
pub fn acceptance(x: f64, w: f64) -> f64 {
    if (-w..0.0).contains(&x) {
        (w + x) / w
    } else if (0.0..=w).contains(&x) {
        (w - x) / w
    } else {
        0.0
    }
}

/// Correlates `target` against `reference`, frame by frame.
///
/// Every reference hit counts as one trigger; for each it fills
/// `target - reference` for all target hits of the same frame. The raw
/// histogram is normalized per trigger and the corrected one is additionally
/// divided by [`acceptance`] with `frame_width`.
///
/// # Errors
/// Returns [`alcorpix_core::Error::InvalidHistogram`] for a bad binning.
#[allow(clippy::cast_precision_loss)]
pub fn correlate(
    reference: &HitCollection,
    target: &HitCollection,
    config: &CorrelationConfig,
    frame_width: i64,
) -> Result<CorrelationResult> {
    let mut raw = Histogram1D::new("hDelta", config.bins, config.min, config.max)?
        .with_title("target - reference time difference per trigger");
    let mut triggers = 0u64;
    let mut matches = 0u64;

    for (frame, reference_hits) in reference.iter() {
        let target_hits = target.get(frame);
        for reference_hit in reference_hits {
            triggers += 1;
            let Some(t_ref) = reference_hit.corrected_time else {
                continue;
            };
            for target_hit in target_hits {
                if let Some(t) = target_hit.corrected_time {
                    raw.fill(t - t_ref);
                    matches += 1;
                }
            }
        }
    }

    if triggers == 0 {
        log::warn!("reference collection has no hits; histogram left unnormalized");
    } else {
        raw.scale(1.0 / triggers as f64);
    }
    log::info!("correlated {matches} pairs over {triggers} triggers");

    let width = frame_width as f64;
    let corrected = raw
        .divided_by("hDelta_corr", |x| acceptance(x, width))
        .with_title("acceptance-corrected time difference per trigger");

    Ok(CorrelationResult {
        raw,
        corrected,
        triggers,
        matches,
    })
}
