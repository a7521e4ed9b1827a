//! Histogram writers.

use crate::Result;
use alcorpix_core::Histogram1D;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serialized form of a [`Histogram1D`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramDocument {
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub min: f64,
    pub max: f64,
    pub contents: Vec<f64>,
    pub errors: Vec<f64>,
    #[serde(default)]
    pub excluded: Vec<usize>,
    #[serde(default)]
    pub underflow: f64,
    #[serde(default)]
    pub overflow: f64,
    #[serde(default)]
    pub entries: u64,
}

impl HistogramDocument {
    /// Captures the bins of `hist`.
    #[must_use]
    pub fn from_histogram(hist: &Histogram1D) -> Self {
        Self {
            name: hist.name().to_string(),
            title: hist.title().to_string(),
            min: hist.min(),
            max: hist.max(),
            contents: hist.contents().to_vec(),
            errors: (0..hist.bins()).map(|i| hist.error(i)).collect(),
            excluded: (0..hist.bins()).filter(|&i| hist.is_excluded(i)).collect(),
            underflow: hist.underflow(),
            overflow: hist.overflow(),
            entries: hist.entries(),
        }
    }
}

/// Writer for histogram outputs.
///
/// Histograms are rendered in full before the file is created, so a failed
/// run never leaves a truncated output behind.
pub struct HistogramWriter;

impl HistogramWriter {
    /// Writes histograms as one CSV table.
    ///
    /// Columns: `histogram,bin,low_edge,center,content,error,excluded`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_csv<P: AsRef<Path>>(path: P, histograms: &[&Histogram1D]) -> Result<()> {
        let mut out = String::from("histogram,bin,low_edge,center,content,error,excluded\n");
        for hist in histograms {
            for i in 0..hist.bins() {
                out.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    hist.name(),
                    i,
                    hist.bin_low_edge(i),
                    hist.bin_center(i),
                    hist.content(i),
                    hist.error(i),
                    u8::from(hist.is_excluded(i))
                ));
            }
        }
        write_all(path.as_ref(), out.as_bytes())
    }

    /// Writes histograms as a JSON array of [`HistogramDocument`]s.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_json<P: AsRef<Path>>(path: P, histograms: &[&Histogram1D]) -> Result<()> {
        let documents: Vec<HistogramDocument> = histograms
            .iter()
            .map(|h| HistogramDocument::from_histogram(h))
            .collect();
        let mut out = serde_json::to_vec_pretty(&documents)?;
        out.push(b'\n');
        write_all(path.as_ref(), &out)
    }

    /// Writes histograms in the format implied by the extension of `path`.
    ///
    /// `.json` selects JSON, `.h5`/`.hdf5` selects HDF5 (with the `hdf5`
    /// feature), anything else CSV.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or the format is not
    /// available.
    pub fn write<P: AsRef<Path>>(path: P, histograms: &[&Histogram1D]) -> Result<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::write_json(path, histograms),
            Some("h5" | "hdf5") => write_hdf5(path, histograms),
            _ => Self::write_csv(path, histograms),
        }?;
        log::info!("wrote {} histograms to {}", histograms.len(), path.display());
        Ok(())
    }
}

#[cfg(feature = "hdf5")]
fn write_hdf5(path: &Path, histograms: &[&Histogram1D]) -> Result<()> {
    crate::hdf5::write_histograms_hdf5(path, histograms)
}

#[cfg(not(feature = "hdf5"))]
fn write_hdf5(path: &Path, _histograms: &[&Histogram1D]) -> Result<()> {
    Err(crate::Error::InvalidFormat(format!(
        "cannot write {}: HDF5 support is not enabled",
        path.display()
    )))
}

fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
