//! Hit table readers.
//!
//! Three on-disk layouts carry the same nine integer columns
//! (`fifo, type, counter, column, pixel, tdc, rollover, coarse, fine`):
//!
//! - delimited text tables with a header row (comma for `.csv`, tab for
//!   `.tsv`, a single space for `.txt`)
//! - packed little-endian binary rows behind an 8-byte magic
//! - HDF5 files with one dataset per column (`hdf5` feature)

use crate::{Error, Result};
use alcorpix_core::soa::COLUMN_NAMES;
use alcorpix_core::{RawRecord, RecordBatch};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Magic bytes at the start of a packed binary table.
pub const BINARY_MAGIC: &[u8; 8] = b"ALCORREC";

/// Bytes per packed row: nine little-endian `i32` columns.
pub const BINARY_ROW_SIZE: usize = COLUMN_NAMES.len() * 4;

/// Opens `path` for reading, reporting a missing file as unavailable input.
///
/// # Errors
/// Returns [`alcorpix_core::Error::InputUnavailable`] if the file does not
/// exist or cannot be opened for lack of permission.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            alcorpix_core::Error::InputUnavailable {
                path: path.to_path_buf(),
            }
            .into()
        }
        _ => Error::Io(e),
    })
}

/// On-disk layout of a hit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Header row plus delimited integers.
    Text,
    /// Packed binary rows.
    Binary,
    /// HDF5 column datasets.
    Hdf5,
}

impl TableFormat {
    /// Guesses the layout from the file extension; unknown extensions are text.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("bin" | "dat" | "alcor") => Self::Binary,
            Some("h5" | "hdf5" | "hdf") => Self::Hdf5,
            _ => Self::Text,
        }
    }
}

/// Field delimiter of a text table, from its extension.
pub fn text_delimiter<P: AsRef<Path>>(path: P) -> u8 {
    let extension = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("tsv" | "tab") => b'\t',
        Some("txt") => b' ',
        _ => b',',
    }
}

/// Reads a hit table in the layout implied by its extension.
///
/// `table` names the HDF5 group holding the columns and is ignored for the
/// other layouts.
///
/// # Errors
/// Returns an error if the input is missing, lacks a required column or is
/// malformed.
pub fn read_records<P: AsRef<Path>>(path: P, table: &str) -> Result<RecordBatch> {
    let path = path.as_ref();
    let batch = match TableFormat::from_path(path) {
        TableFormat::Text => read_text_table(path, text_delimiter(path))?,
        TableFormat::Binary => AlcorBinaryReader::open(path)?.read_batch()?,
        TableFormat::Hdf5 => read_hdf5_table(path, table)?,
    };
    log::info!("{}: {} entries", path.display(), batch.len());
    Ok(batch)
}

#[cfg(feature = "hdf5")]
fn read_hdf5_table(path: &Path, table: &str) -> Result<RecordBatch> {
    crate::hdf5::read_records_hdf5(path, table)
}

#[cfg(not(feature = "hdf5"))]
fn read_hdf5_table(path: &Path, _table: &str) -> Result<RecordBatch> {
    Err(Error::InvalidFormat(format!(
        "{} is an HDF5 file but HDF5 support is not enabled",
        path.display()
    )))
}

/// Reads a delimited text hit table.
///
/// The header row names the columns in any order; `fifo` may be omitted and
/// defaults to zero. Lines starting with `#` and blank lines are skipped,
/// fields may be quoted and surrounding whitespace is trimmed.
///
/// # Errors
/// Returns [`alcorpix_core::Error::SchemaMissing`] if a required column is
/// absent and [`Error::Parse`] for a malformed row.
pub fn read_text_table<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<RecordBatch> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(open_input(path)?);

    let positions = column_positions(reader.headers().map_err(|e| row_error(path, e))?)?;

    let mut batch = RecordBatch::default();
    for result in reader.records() {
        let record = result.map_err(|e| row_error(path, e))?;
        let line = record.position().map_or(0, csv::Position::line);
        let mut values = [0i32; COLUMN_NAMES.len()];
        for (slot, index) in values.iter_mut().zip(&positions) {
            let Some(field) = index.and_then(|i| record.get(i)) else {
                continue;
            };
            *slot = field.parse().map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                line,
                message: format!("invalid integer `{field}`: {e}"),
            })?;
        }
        batch.push(raw_from_columns(values));
    }

    Ok(batch)
}

/// Position of each named column within a text row.
fn column_positions(headers: &csv::StringRecord) -> Result<[Option<usize>; COLUMN_NAMES.len()]> {
    let mut positions = [None; COLUMN_NAMES.len()];
    for (slot, column) in positions.iter_mut().zip(COLUMN_NAMES) {
        *slot = headers
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column));
        if slot.is_none() && column != "fifo" {
            return Err(alcorpix_core::Error::SchemaMissing(format!("column `{column}`")).into());
        }
    }
    Ok(positions)
}

fn row_error(path: &Path, error: csv::Error) -> Error {
    match error.position() {
        Some(position) => Error::Parse {
            path: path.to_path_buf(),
            line: position.line(),
            message: error.to_string(),
        },
        None => Error::Csv(error),
    }
}

fn raw_from_columns(values: [i32; COLUMN_NAMES.len()]) -> RawRecord {
    let [fifo, record_type, counter, column, pixel, tdc, rollover, coarse, fine] = values;
    RawRecord {
        fifo,
        record_type,
        counter,
        column,
        pixel,
        tdc,
        rollover,
        coarse,
        fine,
    }
}

/// A memory-mapped file reader.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = open_input(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the mapping was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for packed binary hit tables.
pub struct AlcorBinaryReader {
    reader: MappedFileReader,
}

impl AlcorBinaryReader {
    /// Opens a packed table and checks its magic and size.
    ///
    /// # Errors
    /// Returns an error if the file is missing, lacks the magic bytes or
    /// ends inside a row.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let bytes = reader.as_bytes();
        if bytes.len() < BINARY_MAGIC.len() || &bytes[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            return Err(Error::InvalidFormat(format!(
                "{} is not a packed ALCOR table",
                reader.path().display()
            )));
        }
        let payload = bytes.len() - BINARY_MAGIC.len();
        if payload % BINARY_ROW_SIZE != 0 {
            return Err(Error::InvalidFormat(format!(
                "payload of {payload} bytes is not a multiple of {BINARY_ROW_SIZE} (file: {})",
                reader.path().display()
            )));
        }
        Ok(Self { reader })
    }

    /// Number of rows in the table, known before decoding.
    #[must_use]
    pub fn record_count(&self) -> usize {
        (self.reader.len() - BINARY_MAGIC.len()) / BINARY_ROW_SIZE
    }

    /// Decodes every row.
    ///
    /// # Errors
    /// Never fails once the file has been opened; the signature leaves room
    /// for row-level validation.
    pub fn read_batch(&self) -> Result<RecordBatch> {
        let payload = &self.reader.as_bytes()[BINARY_MAGIC.len()..];
        let rows: Vec<RawRecord> = payload
            .par_chunks_exact(BINARY_ROW_SIZE)
            .map(decode_row)
            .collect();
        Ok(rows.into_iter().collect())
    }
}

fn decode_row(row: &[u8]) -> RawRecord {
    let mut values = [0i32; COLUMN_NAMES.len()];
    for (value, bytes) in values.iter_mut().zip(row.chunks_exact(4)) {
        *value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    raw_from_columns(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn text_file(content: &str) -> NamedTempFile {
        text_file_with_suffix(content, ".csv")
    }

    fn text_file_with_suffix(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path("run.csv"), TableFormat::Text);
        assert_eq!(TableFormat::from_path("run.BIN"), TableFormat::Binary);
        assert_eq!(TableFormat::from_path("run.h5"), TableFormat::Hdf5);
        assert_eq!(TableFormat::from_path("run"), TableFormat::Text);
        assert_eq!(text_delimiter("run.csv"), b',');
        assert_eq!(text_delimiter("run.TSV"), b'\t');
        assert_eq!(text_delimiter("run.txt"), b' ');
    }

    #[test]
    fn test_text_table_reorders_columns() {
        let file = text_file(
            "# decoded run\n\
             coarse,fine,type,counter,column,pixel,tdc,rollover\n\
             100,12,1,0,2,3,1,4\n\
             \n\
             0,0,7,0,0,0,0,0\n",
        );
        let batch = read_text_table(file.path(), b',').unwrap();
        assert_eq!(batch.len(), 2);
        let row = batch.row(0);
        assert_eq!(row.coarse, 100);
        assert_eq!(row.fine, 12);
        assert_eq!(row.column, 2);
        assert_eq!(row.pixel, 3);
        assert_eq!(row.tdc, 1);
        assert_eq!(row.rollover, 4);
        assert_eq!(row.fifo, 0);
        assert_eq!(batch.row(1).record_type, 7);
    }

    #[test]
    fn test_text_table_space_separated() {
        let file = text_file_with_suffix(
            "fifo type counter column pixel tdc rollover coarse fine\n3 1 9 0 1 2 0 55 7\n",
            ".txt",
        );
        let batch = read_records(file.path(), "alcor").unwrap();
        assert_eq!(batch.row(0).fifo, 3);
        assert_eq!(batch.row(0).coarse, 55);
    }

    #[test]
    fn test_text_table_quoted_fields() {
        let file = text_file(
            "\"type\",\"counter\",\"column\",\"pixel\",\"tdc\",\"rollover\",\"coarse\",\"fine\"\n\
             \"1\",\"0\",\"0\",\"1\",\"2\",\"0\",\"640\",\"17\"\n",
        );
        let batch = read_records(file.path(), "alcor").unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.row(0).record_type, 1);
        assert_eq!(batch.row(0).coarse, 640);
        assert_eq!(batch.row(0).fine, 17);
    }

    #[test]
    fn test_text_table_missing_column() {
        let file = text_file("type,counter,column,pixel,tdc,rollover,coarse\n1,0,0,0,0,0,0\n");
        let err = read_text_table(file.path(), b',').unwrap_err();
        assert!(matches!(
            err,
            Error::CoreError(alcorpix_core::Error::SchemaMissing(ref c)) if c.contains("fine")
        ));
    }

    #[test]
    fn test_text_table_bad_row() {
        let file = text_file("type,counter,column,pixel,tdc,rollover,coarse,fine\n1,0,0,0,x,0,0,0\n");
        let err = read_text_table(file.path(), b',').unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_text_table_short_row() {
        let file = text_file(
            "type,counter,column,pixel,tdc,rollover,coarse,fine\n1,0,0,0,0,0,0,0\n1,0,0,0\n",
        );
        let err = read_text_table(file.path(), b',').unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
    }

    #[test]
    fn test_missing_input_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(dir.path().join("absent.csv"), "alcor").unwrap_err();
        assert!(err.is_input_unavailable());
        let err = AlcorBinaryReader::open(dir.path().join("absent.bin")).err().unwrap();
        assert!(err.is_input_unavailable());
    }

    #[test]
    fn test_binary_requires_magic_and_whole_rows() {
        let mut file = NamedTempFile::with_suffix(".bin").unwrap();
        file.write_all(b"NOTMAGIC").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            AlcorBinaryReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));

        let mut file = NamedTempFile::with_suffix(".bin").unwrap();
        file.write_all(BINARY_MAGIC).unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            AlcorBinaryReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }
}
