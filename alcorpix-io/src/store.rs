//! JSON calibration parameter store.
//!
//! A store file maps each parameter name (`off_0..off_3`, `iif_0..iif_3`,
//! `period`) to its value and symmetric uncertainty:
//!
//! ```json
//! { "off_0": { "value": 0.5, "error": 0.0 }, "iif_0": { "value": 0.0156, "error": 1e-4 } }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use alcorpix_core::params::{CORRECTION_COUNT, PARAMETER_COUNT, PARAMETER_NAMES};
use alcorpix_core::{CorrectionParameters, FitParameters};
use serde::{Deserialize, Serialize};

use crate::reader::open_input;
use crate::Result;

/// One stored parameter.
///
/// An unavailable uncertainty is written as `null` and read back as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub value: f64,
    #[serde(default, deserialize_with = "nullable_error")]
    pub error: f64,
}

fn nullable_error<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// A calibration parameter store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    path: PathBuf,
}

impl ParameterStore {
    /// Creates a store handle for `path`; nothing is read or written yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all nine fitted values with their uncertainties.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, fit: &FitParameters) -> Result<()> {
        let entries: BTreeMap<&str, ParameterEntry> = fit
            .named()
            .map(|(name, value, error)| (name, ParameterEntry { value, error }))
            .collect();

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writeln!(writer)?;
        writer.flush()?;
        log::info!("wrote {} parameters to {}", entries.len(), self.path.display());
        Ok(())
    }

    /// Reads every stored entry.
    ///
    /// # Errors
    /// Returns [`alcorpix_core::Error::InputUnavailable`] if the file is
    /// missing and a JSON error if it is malformed.
    pub fn entries(&self) -> Result<BTreeMap<String, ParameterEntry>> {
        let reader = BufReader::new(open_input(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Reads all nine parameters with their uncertainties.
    ///
    /// # Errors
    /// Returns [`alcorpix_core::Error::SchemaMissing`] if a name is absent.
    pub fn load_fit(&self) -> Result<FitParameters> {
        let entries = self.entries()?;
        let mut values = [0.0; PARAMETER_COUNT];
        let mut errors = [0.0; PARAMETER_COUNT];
        for (i, name) in PARAMETER_NAMES.iter().enumerate() {
            let entry = lookup(&entries, name)?;
            values[i] = entry.value;
            errors[i] = entry.error;
        }
        Ok(FitParameters {
            values: CorrectionParameters::from_array(values),
            errors,
        })
    }

    /// Reads the eight correction values; the period keeps its default.
    ///
    /// # Errors
    /// Returns [`alcorpix_core::Error::SchemaMissing`] if an offset or slope
    /// is absent.
    pub fn load_correction(&self) -> Result<CorrectionParameters> {
        let entries = self.entries()?;
        let values = PARAMETER_NAMES[..CORRECTION_COUNT]
            .iter()
            .map(|name| lookup(&entries, name).map(|e| e.value))
            .collect::<Result<Vec<f64>>>()?;
        Ok(CorrectionParameters::from_correction_slice(&values)?)
    }
}

fn lookup<'a>(
    entries: &'a BTreeMap<String, ParameterEntry>,
    name: &str,
) -> Result<&'a ParameterEntry> {
    entries
        .get(name)
        .ok_or_else(|| alcorpix_core::Error::SchemaMissing(format!("parameter `{name}`")).into())
}
