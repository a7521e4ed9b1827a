//! alcorpix-io: File I/O for alcorpix.
//!
//! This crate provides:
//! - hit table readers for delimited text, packed binary (memory-mapped) and
//!   HDF5 files
//! - the JSON calibration parameter store
//! - histogram writers
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod store;
mod writer;

pub use error::{Error, Result};
pub use reader::{
    open_input, read_records, read_text_table, text_delimiter, AlcorBinaryReader,
    MappedFileReader, TableFormat, BINARY_MAGIC, BINARY_ROW_SIZE,
};
pub use store::{ParameterEntry, ParameterStore};
pub use writer::{HistogramDocument, HistogramWriter};
