//! Frame keys and per-frame hit collections.
//!
//! A frame is a fixed-width window of the unwrapped coarse time inside one
//! spill. Hits sharing a frame are the candidates for cross-channel
//! association.

use std::collections::BTreeMap;

use crate::hit::HitRecord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default frame width in clock cycles.
pub const DEFAULT_FRAME_WIDTH: i64 = 256;

/// Key of a frame: spill index and window index within the spill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub spill: u32,
    pub window: i64,
}

impl Frame {
    /// Creates a frame key.
    #[inline]
    #[must_use]
    pub fn new(spill: u32, window: i64) -> Self {
        Self { spill, window }
    }

    /// Frame containing `raw_coarse` in the given spill.
    ///
    /// # Panics
    /// Panics if `frame_width` is zero.
    #[inline]
    #[must_use]
    pub fn of(spill: u32, raw_coarse: i64, frame_width: i64) -> Self {
        Self {
            spill,
            window: raw_coarse.div_euclid(frame_width),
        }
    }
}

/// Hits of one stream grouped by frame.
///
/// Within a frame, hits keep insertion order; callers insert each spill's
/// hits sorted by corrected time, so every bucket is time ordered.
#[derive(Debug, Clone, Default)]
pub struct HitCollection {
    frames: BTreeMap<Frame, Vec<HitRecord>>,
    hit_count: usize,
}

impl HitCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hit to the bucket of `frame`.
    pub fn push(&mut self, frame: Frame, hit: HitRecord) {
        self.frames.entry(frame).or_default().push(hit);
        self.hit_count += 1;
    }

    /// Hits in `frame`; empty if the frame was never filled.
    #[must_use]
    pub fn get(&self, frame: &Frame) -> &[HitRecord] {
        self.frames.get(frame).map_or(&[], Vec::as_slice)
    }

    /// Iterates over frames in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Frame, &[HitRecord])> {
        self.frames.iter().map(|(frame, hits)| (frame, hits.as_slice()))
    }

    /// Number of non-empty frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Total number of hits across all frames.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    /// Returns true if no hit was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hit_count == 0
    }
}
