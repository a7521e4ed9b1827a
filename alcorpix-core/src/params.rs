//! TDC correction parameters.
//!
//! The fine correction of each of the four TDCs on a channel is linear in
//! the fine counter: `corr = offset[tdc] + slope[tdc] * fine`. Calibration
//! additionally fits the expected hit period, giving nine parameters stored
//! in the order `off_0..off_3, iif_0..iif_3, period`.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of parameters in a calibration fit.
pub const PARAMETER_COUNT: usize = 9;

/// Number of parameters needed by the time corrector alone.
pub const CORRECTION_COUNT: usize = 8;

/// Parameter names as stored in calibration files.
pub const PARAMETER_NAMES: [&str; PARAMETER_COUNT] = [
    "off_0", "off_1", "off_2", "off_3", "iif_0", "iif_1", "iif_2", "iif_3", "period",
];

/// Index of the period parameter.
pub const PERIOD_INDEX: usize = 8;

/// Nominal period between consecutive calibration pulses, in clock cycles.
pub const NOMINAL_PERIOD: f64 = 320.0;

/// Per-TDC linear correction plus the expected hit period.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrectionParameters {
    pub offset: [f64; 4],
    pub slope: [f64; 4],
    /// Expected inter-hit spacing; only the calibration objective reads it.
    pub period: f64,
}

impl Default for CorrectionParameters {
    fn default() -> Self {
        Self {
            offset: [0.0; 4],
            slope: [0.0; 4],
            period: NOMINAL_PERIOD,
        }
    }
}

impl CorrectionParameters {
    /// Parameters that apply no correction.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Starting point for a calibration fit.
    ///
    /// Offsets start at half a clock cycle and slopes at 1/64 of a cycle per
    /// fine count.
    #[must_use]
    pub fn initial_guess() -> Self {
        Self {
            offset: [0.5; 4],
            slope: [0.0156; 4],
            period: NOMINAL_PERIOD,
        }
    }

    /// Builds parameters from the stored nine-value layout.
    #[must_use]
    pub fn from_array(values: [f64; PARAMETER_COUNT]) -> Self {
        Self {
            offset: [values[0], values[1], values[2], values[3]],
            slope: [values[4], values[5], values[6], values[7]],
            period: values[PERIOD_INDEX],
        }
    }

    /// Builds correction-only parameters from the first eight stored values.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if fewer than eight values are given.
    pub fn from_correction_slice(values: &[f64]) -> Result<Self> {
        if values.len() < CORRECTION_COUNT {
            return Err(Error::ConfigError(format!(
                "expected at least {CORRECTION_COUNT} correction values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            offset: [values[0], values[1], values[2], values[3]],
            slope: [values[4], values[5], values[6], values[7]],
            period: NOMINAL_PERIOD,
        })
    }

    /// Flattens into the stored nine-value layout.
    #[must_use]
    pub fn to_array(&self) -> [f64; PARAMETER_COUNT] {
        [
            self.offset[0],
            self.offset[1],
            self.offset[2],
            self.offset[3],
            self.slope[0],
            self.slope[1],
            self.slope[2],
            self.slope[3],
            self.period,
        ]
    }

    /// Fine correction for a hit: `offset[tdc] + fine * slope[tdc]`.
    ///
    /// # Panics
    /// Panics if `tdc > 3`. Hit records are validated on construction, so
    /// this only happens for hand-built records.
    #[inline]
    #[must_use]
    pub fn correction(&self, tdc: u8, fine: u32) -> f64 {
        let tdc = usize::from(tdc);
        self.offset[tdc] + f64::from(fine) * self.slope[tdc]
    }
}

/// Best-fit calibration parameters with symmetric uncertainties.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitParameters {
    pub values: CorrectionParameters,
    pub errors: [f64; PARAMETER_COUNT],
}

impl FitParameters {
    /// Wraps parameter values without uncertainties.
    #[must_use]
    pub fn exact(values: CorrectionParameters) -> Self {
        Self {
            values,
            errors: [0.0; PARAMETER_COUNT],
        }
    }

    /// Iterates over `(name, value, error)` triples in storage order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64, f64)> + '_ {
        let values = self.values.to_array();
        PARAMETER_NAMES
            .iter()
            .enumerate()
            .map(move |(i, &name)| (name, values[i], self.errors[i]))
    }
}
