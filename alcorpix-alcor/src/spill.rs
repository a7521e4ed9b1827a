//! Spill-aware traversal of ALCOR record streams.
//!
//! Two traversal modes are provided:
//!
//! - [`SpillSegmenter`] groups the hits of one channel by spill and only
//!   releases a spill once its end marker is seen.
//! - [`ConsecutiveHits`] pairs each hit of one channel with the previous hit
//!   of the same spill, resetting at every start marker.

use std::mem;

use alcorpix_core::{CorrectionParameters, HitRecord, RecordType};

use crate::timing::apply_correction;

/// Segmenter state between records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpillState {
    BeforeSpill,
    InSpill,
}

/// The hits of one completed spill, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct Spill {
    /// Number of end-of-spill markers seen before this one.
    pub index: u32,
    pub hits: Vec<HitRecord>,
}

/// Splits a record stream into per-spill hit groups for one channel.
///
/// A start marker discards anything accumulated so far and opens a spill;
/// the matching end marker emits the spill. Hits outside an open spill are
/// ignored, as are trigger tags, unknown record types and hits on other
/// channels. A spill still
/// open when the stream ends is dropped, never flushed.
///
/// Every end marker advances the spill index, so two streams recorded in the
/// same run stay aligned even if one of them misses a start marker.
pub struct SpillSegmenter<I> {
    records: I,
    channel: u32,
    state: SpillState,
    current: Vec<HitRecord>,
    next_index: u32,
}

impl<I> SpillSegmenter<I>
where
    I: Iterator<Item = HitRecord>,
{
    /// Creates a segmenter keeping only hits with `column * 4 + pixel == channel`.
    pub fn new<T>(records: T, channel: u32) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            records: records.into_iter(),
            channel,
            state: SpillState::BeforeSpill,
            current: Vec::new(),
            next_index: 0,
        }
    }

    /// Current state of the segmenter.
    pub fn state(&self) -> SpillState {
        self.state
    }

    /// Number of end-of-spill markers consumed so far.
    pub fn spills_seen(&self) -> u32 {
        self.next_index
    }
}

impl<I> Iterator for SpillSegmenter<I>
where
    I: Iterator<Item = HitRecord>,
{
    type Item = Spill;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            match record.record_type {
                RecordType::StartSpill => {
                    if !self.current.is_empty() {
                        log::debug!(
                            "start of spill discards {} hits of an unterminated spill",
                            self.current.len()
                        );
                    }
                    log::debug!("start of spill");
                    self.current.clear();
                    self.state = SpillState::InSpill;
                }
                RecordType::EndSpill => {
                    let index = self.next_index;
                    self.next_index += 1;
                    if self.state == SpillState::InSpill {
                        self.state = SpillState::BeforeSpill;
                        let hits = mem::take(&mut self.current);
                        log::debug!("end of spill {index}: {} hits", hits.len());
                        return Some(Spill { index, hits });
                    }
                    log::debug!("end of spill {index} without a start marker");
                }
                RecordType::AlcorHit => {
                    if self.state == SpillState::InSpill && record.channel() == self.channel {
                        self.current.push(record);
                    }
                }
                RecordType::TriggerTag | RecordType::Other(_) => {}
            }
        }

        if self.state == SpillState::InSpill && !self.current.is_empty() {
            log::debug!(
                "stream ended inside a spill; dropping {} hits",
                self.current.len()
            );
            self.current.clear();
        }
        None
    }
}

/// Pairs of consecutive corrected hits of one channel within a spill.
///
/// Each item is `(previous, current)` with both corrected times populated.
/// The previous-hit slot is cleared at every start marker, so the first hit
/// of a spill only starts a new chain. End markers do not close the chain.
pub struct ConsecutiveHits<'a, I> {
    records: I,
    channel: u32,
    params: &'a CorrectionParameters,
    previous: Option<HitRecord>,
}

impl<'a, I> ConsecutiveHits<'a, I>
where
    I: Iterator<Item = &'a HitRecord>,
{
    /// Creates the pairing over borrowed records.
    pub fn new<T>(records: T, channel: u32, params: &'a CorrectionParameters) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            records: records.into_iter(),
            channel,
            params,
            previous: None,
        }
    }
}

impl<'a, I> Iterator for ConsecutiveHits<'a, I>
where
    I: Iterator<Item = &'a HitRecord>,
{
    type Item = (HitRecord, HitRecord);

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            if record.record_type == RecordType::StartSpill {
                self.previous = None;
                continue;
            }
            if !record.is_hit_on(self.channel) {
                continue;
            }

            let hit = apply_correction(*record, self.params);
            if let Some(previous) = self.previous.replace(hit) {
                return Some((previous, hit));
            }
        }
        None
    }
}
