//! Spill-by-spill hit collection into frames.

use alcorpix_alcor::{apply_correction, ChipConfig, SpillSegmenter};
use alcorpix_core::{CorrectionParameters, Frame, HitCollection, HitRecord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::deadtime::suppress_afterpulses;

/// Configuration for collecting one channel of a stream.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollectConfig {
    /// Channel to keep (`column * 4 + pixel`).
    pub channel: u32,
    /// Drop hits within the dead time of the previous kept hit.
    pub afterpulse_suppression: bool,
}

impl CollectConfig {
    /// Creates a configuration for `channel` without afterpulse suppression.
    #[must_use]
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            afterpulse_suppression: false,
        }
    }

    /// Sets afterpulse suppression.
    #[must_use]
    pub fn with_afterpulse_suppression(mut self, enabled: bool) -> Self {
        self.afterpulse_suppression = enabled;
        self
    }
}

/// Counters gathered while collecting a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollectStatistics {
    /// Completed spills.
    pub spills: usize,
    /// Channel hits inside completed spills.
    pub hits: usize,
    /// Hits removed by afterpulse suppression.
    pub suppressed: usize,
}

/// Appends one spill's hits to `collection`, keyed by frame.
///
/// `hits` must already be corrected and sorted by corrected time, so each
/// bucket stays time ordered.
pub fn bucket_spill(
    collection: &mut HitCollection,
    spill: u32,
    hits: impl IntoIterator<Item = HitRecord>,
    frame_width: i64,
) {
    for hit in hits {
        collection.push(Frame::of(spill, hit.raw_coarse(), frame_width), hit);
    }
}

/// Builds the frame collection of one channel.
///
/// Each completed spill is corrected with `params`, sorted by corrected time,
/// optionally afterpulse-suppressed and bucketed by frame. Hits of an
/// unterminated final spill are not collected.
pub fn collect_hits<I>(
    records: I,
    params: &CorrectionParameters,
    config: &CollectConfig,
    chip: &ChipConfig,
) -> (HitCollection, CollectStatistics)
where
    I: IntoIterator<Item = HitRecord>,
{
    let mut collection = HitCollection::new();
    let mut stats = CollectStatistics::default();

    for spill in SpillSegmenter::new(records, config.channel) {
        let mut hits: Vec<HitRecord> = spill
            .hits
            .into_iter()
            .map(|hit| apply_correction(hit, params))
            .collect();
        hits.sort_by(|a, b| {
            let a = a.corrected_time.unwrap_or(f64::NAN);
            let b = b.corrected_time.unwrap_or(f64::NAN);
            a.total_cmp(&b)
        });

        stats.spills += 1;
        stats.hits += hits.len();
        if config.afterpulse_suppression {
            stats.suppressed += suppress_afterpulses(&mut hits, chip.dead_time);
        }

        bucket_spill(&mut collection, spill.index, hits, chip.frame_width);
    }

    log::info!(
        "collected {} frames from {} spills (channel {}, {} hits, {} suppressed)",
        collection.frame_count(),
        stats.spills,
        config.channel,
        stats.hits,
        stats.suppressed
    );

    (collection, stats)
}
