//! Small helpers for boolean and per-cell grids shared by the stages

use crate::maybe_rayon::*;
use cloudmask_core::raster::{GeoTransform, Raster};
use cloudmask_core::{Error, Result};
use ndarray::{Array2, Zip};

/// Evaluate `f(row, col)` for every cell, one rayon task per row.
pub(crate) fn par_cells<T, F>(shape: (usize, usize), f: F) -> Result<Array2<T>>
where
    T: Send,
    F: Fn(usize, usize) -> T + Send + Sync,
{
    let (rows, cols) = shape;
    let data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| f(row, col)).collect::<Vec<_>>())
        .collect();

    Array2::from_shape_vec(shape, data).map_err(|e| Error::Other(e.to_string()))
}

pub(crate) fn count(mask: &Array2<bool>) -> usize {
    mask.iter().filter(|&&v| v).count()
}

/// `a AND b`
pub(crate) fn and(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x && y)
}

/// `a AND NOT b`
pub(crate) fn and_not(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x && !y)
}

/// `a OR b`
pub(crate) fn or(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x || y)
}

/// `f64` raster with NaN as no-data
pub(crate) fn to_raster(data: Array2<f64>, transform: GeoTransform) -> Raster<f64> {
    let mut raster = Raster::from_array(data);
    raster.set_transform(transform);
    raster.set_nodata(Some(f64::NAN));
    raster
}
