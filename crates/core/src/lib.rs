//! # cloudmask core
//!
//! Core types, traits and I/O shared by the cloudmask crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic 2D grid with a no-data sentinel
//! - `GeoTransform`: affine georeferencing carried through to the outputs
//! - `Neighborhood`: window shapes used by morphology and labelling
//! - `Error` / `Result`: the error taxonomy of the pipeline
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for algorithms exposed by cloudmask.
///
/// Algorithms are pure functions of their input and parameters; any run state
/// lives in the returned output, never in the algorithm value itself.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
