//! ALCOR timing helpers.
//!

use alcorpix_core::{CorrectionParameters, HitRecord};

/// Corrected hit time in clock cycles.
///
/// The coarse counter is unwrapped with the rollover count and the
/// per-TDC fine correction is subtracted:
///
/// `time = coarse + 32768 * rollover - (offset[tdc] + fine * slope[tdc])`
///
/// The period parameter is not used.
#[allow(clippy::cast_precision_loss)]
#[inline]
#[must_use]
pub fn corrected_time(hit: &HitRecord, params: &CorrectionParameters) -> f64 {
    hit.raw_coarse() as f64 - params.correction(hit.tdc, hit.fine)
}

/// Returns `hit` with its corrected time populated.
#[inline]
#[must_use]
pub fn apply_correction(hit: HitRecord, params: &CorrectionParameters) -> HitRecord {
    HitRecord {
        corrected_time: Some(corrected_time(&hit, params)),
        ..hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_correction() {
        let hit = HitRecord::alcor_hit(0, 0, 2, 1, 100, 33);
        let time = corrected_time(&hit, &CorrectionParameters::identity());
        assert_relative_eq!(time, 32868.0);
    }

    #[test]
    fn test_per_tdc_correction() {
        let params = CorrectionParameters::from_array([
            0.1, 0.2, 0.3, 0.4, 0.01, 0.02, 0.03, 0.04, 320.0,
        ]);
        let hit = HitRecord::alcor_hit(0, 0, 3, 0, 1000, 10);
        assert_relative_eq!(corrected_time(&hit, &params), 1000.0 - (0.4 + 0.4));

        let hit = HitRecord::alcor_hit(0, 0, 0, 0, 1000, 10);
        assert_relative_eq!(corrected_time(&hit, &params), 1000.0 - (0.1 + 0.1));
    }

    #[test]
    fn test_larger_correction_gives_earlier_time() {
        let hit = HitRecord::alcor_hit(0, 0, 1, 0, 500, 20);
        let mut params = CorrectionParameters::identity();
        let mut previous = corrected_time(&hit, &params);
        for step in 1..10 {
            params.offset[1] = f64::from(step) * 0.1;
            let time = corrected_time(&hit, &params);
            assert!(time <= previous);
            previous = time;
        }
    }

    #[test]
    fn test_period_does_not_affect_time() {
        let hit = HitRecord::alcor_hit(0, 0, 0, 2, 7, 3);
        let mut params = CorrectionParameters::initial_guess();
        let before = corrected_time(&hit, &params);
        params.period = 1.0e6;
        assert_relative_eq!(corrected_time(&hit, &params), before);
    }

    #[test]
    fn test_apply_correction_populates_time() {
        let hit = HitRecord::alcor_hit(0, 0, 0, 0, 42, 0);
        assert!(hit.corrected_time.is_none());
        let corrected = apply_correction(hit, &CorrectionParameters::identity());
        assert_eq!(corrected.corrected_time, Some(42.0));
        assert_eq!(corrected.coarse, 42);
    }
}
