//! Hit record types for ALCOR readout streams.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of coarse counts per rollover epoch.
pub const ROLLOVER_PERIOD: i64 = 32768;

/// Kind of record found in a readout stream.
///
/// Only [`RecordType::AlcorHit`] carries detector data; the spill markers
/// delimit acquisition windows. Trigger tags and any other code are ignored
/// by the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordType {
    AlcorHit,
    TriggerTag,
    StartSpill,
    EndSpill,
    /// A code this crate does not interpret.
    Other(i32),
}

impl RecordType {
    /// Readout code of an ALCOR hit.
    pub const ALCOR_HIT_CODE: i32 = 1;
    /// Readout code of a start-of-spill marker.
    pub const START_SPILL_CODE: i32 = 7;
    /// Readout code of a trigger tag.
    pub const TRIGGER_TAG_CODE: i32 = 9;
    /// Readout code of an end-of-spill marker.
    pub const END_SPILL_CODE: i32 = 15;

    /// Decodes a readout type code.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::ALCOR_HIT_CODE => Self::AlcorHit,
            Self::TRIGGER_TAG_CODE => Self::TriggerTag,
            Self::START_SPILL_CODE => Self::StartSpill,
            Self::END_SPILL_CODE => Self::EndSpill,
            other => Self::Other(other),
        }
    }

    /// Returns the readout code for this record type.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::AlcorHit => Self::ALCOR_HIT_CODE,
            Self::TriggerTag => Self::TRIGGER_TAG_CODE,
            Self::StartSpill => Self::START_SPILL_CODE,
            Self::EndSpill => Self::END_SPILL_CODE,
            Self::Other(code) => code,
        }
    }

    /// True for the spill boundary markers.
    #[must_use]
    pub fn is_spill_marker(self) -> bool {
        matches!(self, Self::StartSpill | Self::EndSpill)
    }
}

/// One row of a hit table, exactly as stored.
///
/// Field values are parsed integers with no interpretation applied. Use
/// [`HitRecord::try_from`] to validate and tag a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawRecord {
    pub fifo: i32,
    pub record_type: i32,
    pub counter: i32,
    pub column: i32,
    pub pixel: i32,
    pub tdc: i32,
    pub rollover: i32,
    pub coarse: i32,
    pub fine: i32,
}

impl RawRecord {
    /// Channel number `column * 4 + pixel`, computed before any range check.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> i64 {
        i64::from(self.column) * 4 + i64::from(self.pixel)
    }

    /// True if this row is an ALCOR hit on the given channel.
    #[inline]
    #[must_use]
    pub fn is_hit_on(&self, channel: u32) -> bool {
        self.record_type == RecordType::ALCOR_HIT_CODE && self.channel() == i64::from(channel)
    }
}

/// A validated readout record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitRecord {
    pub record_type: RecordType,
    pub counter: i32,
    pub column: u8,
    pub pixel: u8,
    /// TDC that produced the fine timestamp, always in `0..=3`.
    pub tdc: u8,
    pub rollover: u32,
    pub coarse: u32,
    pub fine: u32,
    /// Corrected time in clock cycles, set by the time corrector.
    pub corrected_time: Option<f64>,
}

impl HitRecord {
    /// Creates an uncorrected ALCOR hit.
    #[must_use]
    pub fn alcor_hit(column: u8, pixel: u8, tdc: u8, rollover: u32, coarse: u32, fine: u32) -> Self {
        Self {
            record_type: RecordType::AlcorHit,
            counter: 0,
            column,
            pixel,
            tdc,
            rollover,
            coarse,
            fine,
            corrected_time: None,
        }
    }

    /// Creates a record that carries no hit data (spill marker or trigger tag).
    #[must_use]
    pub fn marker(record_type: RecordType) -> Self {
        Self {
            record_type,
            counter: 0,
            column: 0,
            pixel: 0,
            tdc: 0,
            rollover: 0,
            coarse: 0,
            fine: 0,
            corrected_time: None,
        }
    }

    /// Channel number on the chip: `column * 4 + pixel`.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> u32 {
        u32::from(self.column) * 4 + u32::from(self.pixel)
    }

    /// Unwrapped coarse time: `coarse + 32768 * rollover`.
    #[inline]
    #[must_use]
    pub fn raw_coarse(&self) -> i64 {
        i64::from(self.coarse) + ROLLOVER_PERIOD * i64::from(self.rollover)
    }

    /// True if this is an ALCOR hit on the given channel.
    #[inline]
    #[must_use]
    pub fn is_hit_on(&self, channel: u32) -> bool {
        self.record_type == RecordType::AlcorHit && self.channel() == channel
    }
}

fn narrow<T: TryFrom<i32>>(field: &'static str, value: i32) -> Result<T> {
    T::try_from(value).map_err(|_| Error::FieldOutOfRange {
        field,
        value: i64::from(value),
    })
}

impl TryFrom<RawRecord> for HitRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let record_type = RecordType::from_code(raw.record_type);
        if record_type != RecordType::AlcorHit {
            return Ok(Self {
                counter: raw.counter,
                ..Self::marker(record_type)
            });
        }

        if !(0..=3).contains(&raw.tdc) {
            return Err(Error::MalformedChannelIndex(raw.tdc));
        }

        Ok(Self {
            record_type,
            counter: raw.counter,
            column: narrow("column", raw.column)?,
            pixel: narrow("pixel", raw.pixel)?,
            tdc: narrow("tdc", raw.tdc)?,
            rollover: narrow("rollover", raw.rollover)?,
            coarse: narrow("coarse", raw.coarse)?,
            fine: narrow("fine", raw.fine)?,
            corrected_time: None,
        })
    }
}
