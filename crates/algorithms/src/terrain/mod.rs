//! Terrain derivatives of an elevation raster

mod slope;

pub use slope::{slope, SlopeParams, SlopeUnits};
