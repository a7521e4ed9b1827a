//! Calibration objective: spread of consecutive-hit intervals.
//!
//! With a periodic test pulse on one channel, corrected times of consecutive
//! hits should differ by exactly the pulse period. The objective sums the
//! squared deviation over all consecutive pairs of a spill whose raw spacing
//! is close to the nominal pulse spacing.

use alcorpix_alcor::{ChipConfig, ConsecutiveHits};
use alcorpix_core::{CorrectionParameters, Error, Histogram1D, HitRecord, Result};

/// Outcome of one objective evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    /// Sum of squared residuals over accepted pairs.
    pub sum_squares: f64,
    /// Number of accepted pairs.
    pub samples: usize,
    /// Consecutive pairs seen, accepted or not.
    pub pairs: usize,
}

impl Evaluation {
    /// Single-hit time resolution in nanoseconds.
    ///
    /// The residual of a pair mixes two independent hit times, hence the
    /// factor 1/sqrt(2). `None` when no pair was accepted.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn sigma_ns(&self, clock_period_ns: f64) -> Option<f64> {
        if self.samples == 0 {
            return None;
        }
        Some((self.sum_squares / self.samples as f64 / 2.0).sqrt() * clock_period_ns)
    }

    /// Objective value handed to a minimizer; infinite when degenerate.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.samples == 0 {
            f64::INFINITY
        } else {
            self.sum_squares
        }
    }
}

/// Sum-of-squared-residuals objective over a validated record stream.
///
/// Evaluation only reads the records, so one objective can be evaluated
/// from several threads at once and in any order.
#[derive(Debug, Clone, Copy)]
pub struct ResidualObjective<'a> {
    records: &'a [HitRecord],
    channel: u32,
    chip: &'a ChipConfig,
}

impl<'a> ResidualObjective<'a> {
    /// Creates the objective for one channel of `records`.
    #[must_use]
    pub fn new(records: &'a [HitRecord], channel: u32, chip: &'a ChipConfig) -> Self {
        Self {
            records,
            channel,
            chip,
        }
    }

    /// Channel the objective is computed for.
    #[must_use]
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Evaluates the objective at `params`.
    #[must_use]
    pub fn evaluate(&self, params: &CorrectionParameters) -> Evaluation {
        self.evaluate_into(params, None)
    }

    /// Evaluates at `params`, filling every pair residual into `residuals`.
    ///
    /// The histogram receives residuals of rejected pairs too, so it shows
    /// the tails the spacing gate removes from the objective.
    #[must_use]
    pub fn evaluate_into(
        &self,
        params: &CorrectionParameters,
        mut residuals: Option<&mut Histogram1D>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for (previous, hit) in ConsecutiveHits::new(self.records, self.channel, params) {
            let (Some(t0), Some(t1)) = (previous.corrected_time, hit.corrected_time) else {
                continue;
            };
            let delta = t1 - t0 - params.period;
            let gap = hit.raw_coarse() - previous.raw_coarse();

            evaluation.pairs += 1;
            if self.chip.gap_accepted(gap) {
                evaluation.sum_squares += delta * delta;
                evaluation.samples += 1;
            }
            if let Some(hist) = residuals.as_deref_mut() {
                hist.fill(delta);
            }
        }

        evaluation
    }

    /// Objective value at `params`, infinite when no pair is accepted.
    #[must_use]
    pub fn value(&self, params: &CorrectionParameters) -> f64 {
        self.evaluate(params).value()
    }

    /// Evaluates at `params`, rejecting degenerate points.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateFit`] if no pair passes the spacing gate.
    pub fn evaluate_checked(&self, params: &CorrectionParameters) -> Result<Evaluation> {
        let evaluation = self.evaluate(params);
        if evaluation.samples == 0 {
            return Err(Error::DegenerateFit);
        }
        Ok(evaluation)
    }
}
