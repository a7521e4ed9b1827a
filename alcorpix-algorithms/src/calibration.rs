//! Calibration fit of the per-TDC correction constants.

use alcorpix_alcor::ChipConfig;
use alcorpix_core::params::PARAMETER_COUNT;
use alcorpix_core::{CorrectionParameters, Error, FitParameters, Histogram1D, HitRecord, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::minimizer::Minimizer;
use crate::objective::{Evaluation, ResidualObjective};

/// Configuration for the calibration fit.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// Starting point of the minimization.
    pub initial: CorrectionParameters,
    /// Parameters held at their initial value.
    pub fixed: [bool; PARAMETER_COUNT],
    /// Diagnostic residual histogram bins.
    pub diagnostic_bins: usize,
    /// Diagnostic residual histogram lower edge.
    pub diagnostic_min: f64,
    /// Diagnostic residual histogram upper edge.
    pub diagnostic_max: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        let mut fixed = [false; PARAMETER_COUNT];
        fixed[0] = true;
        Self {
            initial: CorrectionParameters::initial_guess(),
            fixed,
            diagnostic_bins: 50,
            diagnostic_min: -0.5,
            diagnostic_max: 0.5,
        }
    }
}

impl FitConfig {
    /// Sets the starting point.
    #[must_use]
    pub fn with_initial(mut self, initial: CorrectionParameters) -> Self {
        self.initial = initial;
        self
    }

    /// Pins or frees parameter `index`.
    #[must_use]
    pub fn with_fixed(mut self, index: usize, fixed: bool) -> Self {
        if let Some(slot) = self.fixed.get_mut(index) {
            *slot = fixed;
        }
        self
    }

    /// Sets the diagnostic histogram binning.
    #[must_use]
    pub fn with_diagnostic_binning(mut self, bins: usize, min: f64, max: f64) -> Self {
        self.diagnostic_bins = bins;
        self.diagnostic_min = min;
        self.diagnostic_max = max;
        self
    }
}

/// Result of a calibration fit.
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    /// Best-fit parameters and uncertainties.
    pub parameters: FitParameters,
    /// Objective evaluated at the best point.
    pub evaluation: Evaluation,
    /// Single-hit time resolution at the best point, in nanoseconds.
    pub sigma_ns: f64,
    /// Residuals of every consecutive pair at the best point.
    pub residuals: Histogram1D,
    /// Whether the minimizer reported convergence.
    pub converged: bool,
}

/// Fits the correction constants of `channel` from a periodic pulse stream.
///
/// The objective is minimized with `minimizer`, then re-evaluated once at
/// the best point to fill the diagnostic residual histogram.
///
/// # Errors
/// Returns [`Error::DegenerateFit`] if no pair passes the spacing gate at the
/// best point, or [`Error::InvalidHistogram`] for a bad diagnostic binning.
pub fn calibrate<M: Minimizer>(
    records: &[HitRecord],
    channel: u32,
    chip: &ChipConfig,
    config: &FitConfig,
    minimizer: &M,
) -> Result<CalibrationResult> {
    let mut residuals = Histogram1D::new(
        "hDelta",
        config.diagnostic_bins,
        config.diagnostic_min,
        config.diagnostic_max,
    )?
    .with_title(format!("consecutive-hit residuals, channel {channel}"));

    let objective = ResidualObjective::new(records, channel, chip);
    // Fail early instead of letting the minimizer wander on a flat infinity.
    objective.evaluate_checked(&config.initial)?;

    log::info!(
        "fitting channel {} with {} ({} records)",
        channel,
        minimizer.name(),
        records.len()
    );
    let outcome = minimizer.minimize(|p| objective.value(p), &config.initial, &config.fixed);
    if !outcome.converged {
        log::warn!(
            "minimizer stopped after {} iterations without converging",
            outcome.iterations
        );
    }

    let evaluation = objective.evaluate_into(&outcome.parameters.values, Some(&mut residuals));
    let sigma_ns = evaluation
        .sigma_ns(chip.clock_period_ns)
        .ok_or(Error::DegenerateFit)?;

    log::info!(
        "channel {}: {} pairs accepted of {}, sigma = {:.4} ns",
        channel,
        evaluation.samples,
        evaluation.pairs,
        sigma_ns
    );

    Ok(CalibrationResult {
        parameters: outcome.parameters,
        evaluation,
        sigma_ns,
        residuals,
        converged: outcome.converged,
    })
}
