//! Structure of Arrays (`SoA`) storage for hit tables.
//!
//! Readers fill a `RecordBatch` column by column, matching the layout of the
//! tabular stores the readout produces. Rows are validated lazily, and only
//! the hits of the channel being analysed are checked.

use crate::hit::{HitRecord, RawRecord, RecordType};
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column names of an ALCOR hit table, in storage order.
pub const COLUMN_NAMES: [&str; 9] = [
    "fifo", "type", "counter", "column", "pixel", "tdc", "rollover", "coarse", "fine",
];

/// A table of readout records stored in Structure of Arrays (`SoA`) format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordBatch {
    pub fifo: Vec<i32>,
    pub record_type: Vec<i32>,
    pub counter: Vec<i32>,
    pub column: Vec<i32>,
    pub pixel: Vec<i32>,
    pub tdc: Vec<i32>,
    pub rollover: Vec<i32>,
    pub coarse: Vec<i32>,
    pub fine: Vec<i32>,
}

impl RecordBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fifo: Vec::with_capacity(capacity),
            record_type: Vec::with_capacity(capacity),
            counter: Vec::with_capacity(capacity),
            column: Vec::with_capacity(capacity),
            pixel: Vec::with_capacity(capacity),
            tdc: Vec::with_capacity(capacity),
            rollover: Vec::with_capacity(capacity),
            coarse: Vec::with_capacity(capacity),
            fine: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record_type.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_type.is_empty()
    }

    /// True when every column holds the same number of rows.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        [
            self.fifo.len(),
            self.counter.len(),
            self.column.len(),
            self.pixel.len(),
            self.tdc.len(),
            self.rollover.len(),
            self.coarse.len(),
            self.fine.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }

    /// Pushes a single raw row into the batch.
    pub fn push(&mut self, raw: RawRecord) {
        self.fifo.push(raw.fifo);
        self.record_type.push(raw.record_type);
        self.counter.push(raw.counter);
        self.column.push(raw.column);
        self.pixel.push(raw.pixel);
        self.tdc.push(raw.tdc);
        self.rollover.push(raw.rollover);
        self.coarse.push(raw.coarse);
        self.fine.push(raw.fine);
    }

    /// Appends all rows from another batch to this one.
    pub fn append(&mut self, other: &RecordBatch) {
        self.fifo.extend_from_slice(&other.fifo);
        self.record_type.extend_from_slice(&other.record_type);
        self.counter.extend_from_slice(&other.counter);
        self.column.extend_from_slice(&other.column);
        self.pixel.extend_from_slice(&other.pixel);
        self.tdc.extend_from_slice(&other.tdc);
        self.rollover.extend_from_slice(&other.rollover);
        self.coarse.extend_from_slice(&other.coarse);
        self.fine.extend_from_slice(&other.fine);
    }

    /// Returns row `i` as stored.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds.
    #[must_use]
    pub fn row(&self, i: usize) -> RawRecord {
        RawRecord {
            fifo: self.fifo[i],
            record_type: self.record_type[i],
            counter: self.counter[i],
            column: self.column[i],
            pixel: self.pixel[i],
            tdc: self.tdc[i],
            rollover: self.rollover[i],
            coarse: self.coarse[i],
            fine: self.fine[i],
        }
    }

    /// Iterates over the raw rows in stream order.
    pub fn rows(&self) -> impl Iterator<Item = RawRecord> + '_ {
        (0..self.len()).map(|i| self.row(i))
    }

    /// Spill markers and the hits of `channel`, validated, in stream order.
    ///
    /// Hits on other channels, trigger tags and unknown record types are
    /// skipped without validation.
    ///
    /// # Errors
    /// Returns the first validation error of a hit on `channel`.
    pub fn channel_records(&self, channel: u32) -> Result<Vec<HitRecord>> {
        self.rows()
            .filter(|raw| {
                raw.is_hit_on(channel)
                    || RecordType::from_code(raw.record_type).is_spill_marker()
            })
            .map(HitRecord::try_from)
            .collect()
    }
}

impl FromIterator<RawRecord> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        let mut batch = Self::default();
        for raw in iter {
            batch.push(raw);
        }
        batch
    }
}
