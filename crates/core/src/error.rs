//! Error types for cloudmask
//!
//! Fatal input problems and configuration problems are errors and abort a run
//! before any stage executes. Degraded auxiliary data and unusable sun
//! geometry are not errors; the pipeline reports them as warnings.

use thiserror::Error;

/// Main error type for cloudmask operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch for {layer}: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch {
        layer: String,
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("Required band missing: {0}")]
    MissingBand(String),

    #[error("Class code {code} is assigned to both {first} and {second}")]
    DuplicateClassCode {
        code: u8,
        first: &'static str,
        second: &'static str,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error stems from the run configuration rather than the input data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::DuplicateClassCode { .. } | Error::InvalidParameter { .. }
        )
    }

    /// Whether this error stems from missing or misaligned input bands
    pub fn is_fatal_input(&self) -> bool {
        matches!(self, Error::MissingBand(_) | Error::SizeMismatch { .. })
    }
}

/// Result type alias for cloudmask operations
pub type Result<T> = std::result::Result<T, Error>;
