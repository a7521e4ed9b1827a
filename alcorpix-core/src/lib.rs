//! alcorpix-core: Core types for ALCOR hit-stream processing.
//!
//! This crate provides the hit record model and its columnar table form,
//! the TDC correction parameter set, frame keys with their hit collections,
//! and the fixed-binning histogram used for all time-difference outputs.
//!

pub mod error;
pub mod frame;
pub mod histogram;
pub mod hit;
pub mod params;
pub mod soa;

pub use error::{Error, Result};
pub use frame::{Frame, HitCollection};
pub use histogram::Histogram1D;
pub use hit::{HitRecord, RawRecord, RecordType, ROLLOVER_PERIOD};
pub use params::{CorrectionParameters, FitParameters, PARAMETER_COUNT, PARAMETER_NAMES};
pub use soa::RecordBatch;
