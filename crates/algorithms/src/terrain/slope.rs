//! Slope calculation from DEMs
//!
//! Horn (1981) finite differences over a 3x3 neighborhood. Neighbors outside
//! the raster or holding no-data are replaced by the center value, so every
//! valid cell gets a slope, including the scene edge.

use crate::maybe_rayon::*;
use cloudmask_core::raster::Raster;
use cloudmask_core::{Error, Result};
use ndarray::Array2;

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise
    Percent,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Default)]
pub struct SlopeParams {
    pub units: SlopeUnits,
    /// Horizontal cell size in elevation units; the raster's own cell size when `None`
    pub cell_size: Option<f64>,
}

/// Calculate slope from a DEM
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cellsize)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cellsize)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let cell_size = params.cell_size.unwrap_or_else(|| dem.cell_size());
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: cell_size.to_string(),
            reason: "must be a positive number".to_string(),
        });
    }
    let eight_cell_size = 8.0 * cell_size;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let e = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(e) {
                    continue;
                }

                let at = |dr: isize, dc: isize| -> f64 {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        return e;
                    }
                    let v = unsafe { dem.get_unchecked(nr as usize, nc as usize) };
                    if dem.is_nodata(v) { e } else { v }
                };

                let (a, b, c) = (at(-1, -1), at(-1, 0), at(-1, 1));
                let (d, f) = (at(0, -1), at(0, 1));
                let (g, h, i) = (at(1, -1), at(1, 0), at(1, 1));

                let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_cell_size;
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_cell_size;
                let gradient = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();

                *out = match params.units {
                    SlopeUnits::Degrees => gradient.atan().to_degrees(),
                    SlopeUnits::Percent => gradient * 100.0,
                };
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
