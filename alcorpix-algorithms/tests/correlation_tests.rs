use alcorpix_algorithms::{
    acceptance, collect_hits, correlate, ChipConfig, CollectConfig, CorrelationConfig,
};
use alcorpix_core::{CorrectionParameters, HitRecord, RecordType};
use approx::assert_relative_eq;

fn spill_of(hits: &[(u8, u32)]) -> Vec<HitRecord> {
    let mut records = vec![HitRecord::marker(RecordType::StartSpill)];
    for &(pixel, coarse) in hits {
        records.push(HitRecord::alcor_hit(0, pixel, 0, 0, coarse, 0));
    }
    records.push(HitRecord::marker(RecordType::EndSpill));
    records
}

fn run(records: &[HitRecord], suppress: bool) -> alcorpix_algorithms::CorrelationResult {
    let chip = ChipConfig::default();
    let params = CorrectionParameters::identity();
    let (reference, _) = collect_hits(records.iter().copied(), &params, &CollectConfig::new(0), &chip);
    let target_config = CollectConfig::new(1).with_afterpulse_suppression(suppress);
    let (target, _) = collect_hits(records.iter().copied(), &params, &target_config, &chip);
    correlate(&reference, &target, &CorrelationConfig::default(), chip.frame_width).unwrap()
}

#[test]
fn test_normalization_reproduces_match_count() {
    let records = spill_of(&[(0, 10), (1, 12), (1, 40), (0, 100), (1, 90), (0, 300), (1, 520)]);
    let result = run(&records, false);

    // frame 0: ref 10, 100 x target 12, 40, 90 -> 6 pairs; frame 1: ref 300, no target
    assert_eq!(result.triggers, 3);
    assert_eq!(result.matches, 6);
    assert_relative_eq!(
        result.raw.integral() * result.triggers as f64,
        result.matches as f64,
        epsilon = 1e-9
    );
}

#[test]
fn test_afterpulse_suppression_reduces_matches() {
    let records = spill_of(&[(0, 10), (1, 12), (1, 20), (1, 44)]);
    assert_eq!(run(&records, false).matches, 3);
    // 20 is within the dead time of 12
    assert_eq!(run(&records, true).matches, 2);
}

#[test]
fn test_corrected_is_raw_over_acceptance() {
    let records = spill_of(&[(0, 10), (1, 12), (1, 60), (0, 50), (1, 5)]);
    let result = run(&records, false);
    let (raw, corrected) = (&result.raw, &result.corrected);

    assert_eq!(corrected.name(), "hDelta_corr");
    for i in 0..raw.bins() {
        let acc = acceptance(raw.bin_center(i), 256.0);
        assert!(acc > 0.0);
        assert!(!corrected.is_excluded(i));
        assert_relative_eq!(corrected.content(i), raw.content(i) / acc, epsilon = 1e-12);
    }
}

#[test]
fn test_wide_range_excludes_zero_acceptance_bins() {
    let records = spill_of(&[(0, 10), (1, 12)]);
    let chip = ChipConfig::default();
    let params = CorrectionParameters::identity();
    let (reference, _) = collect_hits(records.iter().copied(), &params, &CollectConfig::new(0), &chip);
    let (target, _) = collect_hits(records.iter().copied(), &params, &CollectConfig::new(1), &chip);
    let config = CorrelationConfig::default().with_binning(8, -400.0, 400.0);
    let result = correlate(&reference, &target, &config, chip.frame_width).unwrap();

    // bin centres -350 and 350 lie outside the frame width
    assert!(result.corrected.is_excluded(0));
    assert!(result.corrected.is_excluded(7));
    assert!(!result.corrected.is_excluded(4));
    assert_relative_eq!(result.corrected.content(0), 0.0);
}
