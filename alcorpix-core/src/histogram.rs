//! One-dimensional fixed-binning histogram.
//!
//! Bins are `[lo, hi)` with equal width. Values outside the axis go to the
//! underflow and overflow counters. Each bin also tracks the sum of squared
//! weights so errors survive scaling and division.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named 1-D histogram over `[min, max)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram1D {
    name: String,
    title: String,
    min: f64,
    max: f64,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    /// Bins where a divisor evaluated to zero.
    excluded: Vec<bool>,
    underflow: f64,
    overflow: f64,
    entries: u64,
}

impl Histogram1D {
    /// Creates an empty histogram with `bins` equal-width bins.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHistogram`] if `bins` is zero or the range is empty.
    pub fn new(name: impl Into<String>, bins: usize, min: f64, max: f64) -> Result<Self> {
        if bins == 0 {
            return Err(Error::InvalidHistogram("bin count must be positive".into()));
        }
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidHistogram(format!(
                "axis range [{min}, {max}) is empty or not finite"
            )));
        }
        Ok(Self {
            name: name.into(),
            title: String::new(),
            min,
            max,
            contents: vec![0.0; bins],
            sumw2: vec![0.0; bins],
            excluded: vec![false; bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    /// Sets a descriptive title (axis labels for plotting tools).
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn bins(&self) -> usize {
        self.contents.len()
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Width of every bin.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins() as f64
    }

    /// Centre of bin `i`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn bin_center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width()
    }

    /// Lower edge of bin `i`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn bin_low_edge(&self, i: usize) -> f64 {
        self.min + i as f64 * self.bin_width()
    }

    /// Bin index holding `x`, or `None` for under/overflow and NaN.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    #[must_use]
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.min && x < self.max) {
            return None;
        }
        let bin = ((x - self.min) / (self.max - self.min) * self.bins() as f64) as usize;
        Some(bin.min(self.bins() - 1))
    }

    /// Adds one unit-weight entry at `x`.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    /// Adds an entry at `x` with weight `w`.
    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        self.entries += 1;
        match self.find_bin(x) {
            Some(bin) => {
                self.contents[bin] += w;
                self.sumw2[bin] += w * w;
            }
            None if x < self.min => self.underflow += w,
            // NaN counts as overflow
            None => self.overflow += w,
        }
    }

    /// Content of bin `i`.
    #[must_use]
    pub fn content(&self, i: usize) -> f64 {
        self.contents[i]
    }

    /// Statistical error of bin `i`.
    #[must_use]
    pub fn error(&self, i: usize) -> f64 {
        self.sumw2[i].sqrt()
    }

    /// True if bin `i` was excluded by a zero divisor.
    #[must_use]
    pub fn is_excluded(&self, i: usize) -> bool {
        self.excluded[i]
    }

    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    #[must_use]
    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    #[must_use]
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Number of fill calls.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of in-range bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Multiplies every bin, including under/overflow, by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for (content, w2) in self.contents.iter_mut().zip(&mut self.sumw2) {
            *content *= factor;
            *w2 *= factor * factor;
        }
        self.underflow *= factor;
        self.overflow *= factor;
    }

    /// Returns a copy with every bin divided by `f(bin centre)`.
    ///
    /// Bins where `f` is zero get zero content and are marked excluded.
    #[must_use]
    pub fn divided_by(&self, name: impl Into<String>, f: impl Fn(f64) -> f64) -> Self {
        let mut out = self.clone();
        out.name = name.into();
        for i in 0..out.bins() {
            let divisor = f(self.bin_center(i));
            if divisor == 0.0 {
                out.contents[i] = 0.0;
                out.sumw2[i] = 0.0;
                out.excluded[i] = true;
            } else {
                out.contents[i] /= divisor;
                out.sumw2[i] /= divisor * divisor;
            }
        }
        out
    }
}
