//! Afterpulse suppression.

use alcorpix_core::HitRecord;

/// Removes hits closer than `dead_time` to the last kept hit.
///
/// `hits` must be sorted by corrected time. The filter walks forward once,
/// keeping the first hit and then every hit at least `dead_time` after the
/// last one kept. It is greedy: a burst of hits spaced below the dead time
/// collapses to its first member even when a later subset would have been
/// mutually compatible. Order is preserved and hits are only removed.
///
/// Returns the number of hits removed.
pub fn suppress_afterpulses(hits: &mut Vec<HitRecord>, dead_time: f64) -> usize {
    let before = hits.len();
    let mut last_kept: Option<f64> = None;

    hits.retain(|hit| {
        let Some(time) = hit.corrected_time else {
            // Uncorrected hits carry no time to compare against.
            return true;
        };
        if let Some(last) = last_kept {
            if time - last < dead_time {
                return false;
            }
        }
        last_kept = Some(time);
        true
    });

    before - hits.len()
}
