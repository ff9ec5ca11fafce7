//! Statistical building blocks for raster data
//!
//! - **percentile**: interpolated percentiles over masked samples
//! - **otsu**: histogram-based two-class threshold
//! - **focal**: moving window mean and variance
//! - **regression**: ordinary least squares line fit

pub mod focal;
pub mod otsu;
pub mod percentile;
pub mod regression;

pub use focal::{focal_statistics, focal_variance, FocalPadding, FocalParams, FocalStatistic};
pub use otsu::{otsu_threshold, OTSU_BINS};
pub use percentile::{masked_percentile, masked_values, percentile, percentile_sorted};
pub use regression::{linear_regression, LinearFit};
