//! HDF5 hit table input and histogram output.
//!
//! A hit table is a group holding one 1-D `i32` dataset per column, named
//! after [`COLUMN_NAMES`]. Histograms are written as one group each with
//! `contents`, `errors` and `excluded` datasets and the axis as attributes.

use crate::reader::open_input;
use crate::{Error, Result};
use alcorpix_core::soa::COLUMN_NAMES;
use alcorpix_core::{Histogram1D, RecordBatch};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{File, Group};
use ndarray::ArrayView1;
use std::path::Path;
use std::str::FromStr;

/// Reads the hit table stored in group `table`.
///
/// # Errors
/// Returns [`alcorpix_core::Error::InputUnavailable`] if the file is missing
/// and [`alcorpix_core::Error::SchemaMissing`] if the group or a required
/// column is absent. `fifo` is optional.
pub fn read_records_hdf5<P: AsRef<Path>>(path: P, table: &str) -> Result<RecordBatch> {
    let path = path.as_ref();
    // Surface a missing file the same way as the other readers.
    drop(open_input(path)?);
    let file = File::open(path)?;
    let group = file
        .group(table)
        .map_err(|_| alcorpix_core::Error::SchemaMissing(format!("table `{table}`")))?;

    let mut columns: Vec<Vec<i32>> = Vec::with_capacity(COLUMN_NAMES.len());
    for name in COLUMN_NAMES {
        match read_dataset_vec_opt::<i32>(&group, name)? {
            Some(values) => columns.push(values),
            None if name == "fifo" => columns.push(Vec::new()),
            None => {
                return Err(
                    alcorpix_core::Error::SchemaMissing(format!("column `{table}/{name}`")).into(),
                )
            }
        }
    }

    let len = columns[1].len();
    if columns.iter().skip(1).any(|c| c.len() != len) {
        return Err(Error::InvalidFormat(format!(
            "columns of `{table}` differ in length"
        )));
    }
    if columns[0].is_empty() {
        columns[0] = vec![0; len];
    }

    let mut columns = columns.into_iter();
    let mut next = || columns.next().unwrap_or_default();
    let batch = RecordBatch {
        fifo: next(),
        record_type: next(),
        counter: next(),
        column: next(),
        pixel: next(),
        tdc: next(),
        rollover: next(),
        coarse: next(),
        fine: next(),
    };
    if !batch.is_consistent() {
        return Err(Error::InvalidFormat(format!(
            "`{table}/fifo` differs in length from the other columns"
        )));
    }
    Ok(batch)
}

/// Writes each histogram into its own group of a new file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or two histograms share a name.
pub fn write_histograms_hdf5<P: AsRef<Path>>(path: P, histograms: &[&Histogram1D]) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str(&file, "alcorpix_format_version", "0.1")?;

    for hist in histograms {
        let group = file.create_group(hist.name())?;
        set_attr_str(&group, "title", hist.title())?;
        set_attr_scalar(&group, "min", hist.min())?;
        set_attr_scalar(&group, "max", hist.max())?;
        set_attr_scalar(&group, "underflow", hist.underflow())?;
        set_attr_scalar(&group, "overflow", hist.overflow())?;
        set_attr_scalar(&group, "entries", hist.entries())?;

        let errors: Vec<f64> = (0..hist.bins()).map(|i| hist.error(i)).collect();
        let excluded: Vec<u8> = (0..hist.bins())
            .map(|i| u8::from(hist.is_excluded(i)))
            .collect();
        write_dataset(&group, "contents", hist.contents())?;
        write_dataset(&group, "errors", &errors)?;
        write_dataset(&group, "excluded", &excluded)?;
    }
    Ok(())
}

fn write_dataset<T: H5Type>(group: &Group, name: &str, values: &[T]) -> Result<()> {
    group
        .new_dataset::<T>()
        .shape((values.len(),))
        .create(name)?
        .write(ArrayView1::from(values))?;
    Ok(())
}

fn read_dataset_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn set_attr_scalar<T: H5Type>(group: &Group, name: &str, value: T) -> Result<()> {
    group.new_attr::<T>().create(name)?.write_scalar(&value)?;
    Ok(())
}

fn set_attr_str(location: &Group, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alcorpix_core::RawRecord;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    fn write_table(path: &Path, table: &str, batch: &RecordBatch) {
        let file = File::create(path).unwrap();
        let group = file.create_group(table).unwrap();
        let columns: [&[i32]; 9] = [
            &batch.fifo,
            &batch.record_type,
            &batch.counter,
            &batch.column,
            &batch.pixel,
            &batch.tdc,
            &batch.rollover,
            &batch.coarse,
            &batch.fine,
        ];
        for (name, values) in COLUMN_NAMES.iter().zip(columns) {
            write_dataset(&group, name, values).unwrap();
        }
    }

    #[test]
    fn test_hdf5_records_roundtrip() {
        let batch: RecordBatch = (0..5)
            .map(|i| RawRecord {
                record_type: 1,
                column: i,
                coarse: 100 * i,
                fine: 7,
                ..RawRecord::default()
            })
            .collect();
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        write_table(file.path(), "alcor", &batch);

        let loaded = read_records_hdf5(file.path(), "alcor").unwrap();
        assert_eq!(loaded, batch);
    }

    #[test]
    fn test_hdf5_missing_table() {
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        let batch: RecordBatch = std::iter::once(RawRecord::default()).collect();
        write_table(file.path(), "alcor", &batch);
        let err = read_records_hdf5(file.path(), "trigger").unwrap_err();
        assert!(matches!(
            err,
            Error::CoreError(alcorpix_core::Error::SchemaMissing(_))
        ));
    }

    #[test]
    fn test_hdf5_histogram_layout() {
        let mut hist = Histogram1D::new("hDelta", 10, -1.0, 1.0).unwrap().with_title("t");
        hist.fill(0.05);
        hist.fill(0.05);
        hist.fill(-0.95);
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        write_histograms_hdf5(file.path(), &[&hist]).unwrap();

        let group = File::open(file.path()).unwrap().group("hDelta").unwrap();
        let contents = group.dataset("contents").unwrap().read_raw::<f64>().unwrap();
        let errors = group.dataset("errors").unwrap().read_raw::<f64>().unwrap();
        let title: VarLenUnicode = group.attr("title").unwrap().read_scalar().unwrap();
        assert_eq!(contents, hist.contents());
        assert_eq!(title.as_str(), "t");
        assert_relative_eq!(group.attr("min").unwrap().read_scalar::<f64>().unwrap(), -1.0);
        assert_relative_eq!(errors[5], 2f64.sqrt(), epsilon = 1e-12);
    }
}
