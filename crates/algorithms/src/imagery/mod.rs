//! Spectral index computations
//!
//! - Normalized difference: generic two-band index
//! - NDVI, NDSI, NDBI: the indices used by the cloud and snow tests
//! - Line enhancement: strongest 3x3 line-template response

mod indices;
mod lines;

pub use indices::{
    ndbi, ndsi, ndvi, normalized_difference, DENOMINATOR_EPSILON,
};
pub use lines::enhance_lines;
