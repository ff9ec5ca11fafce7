//! Line enhancement
//!
//! Each pixel takes the strongest response of four 3x3 line detectors
//! (horizontal, vertical and both diagonals), which brings out roads and
//! dense built-up structure in an index such as NDBI.

use crate::maybe_rayon::*;
use cloudmask_core::{Error, Result};
use ndarray::Array2;

/// Line detector templates, center row/column/diagonal weighted 2, rest -1, scaled by 1/6
const LINE_TEMPLATES: [[[f64; 3]; 3]; 4] = [
    [[-1.0, -1.0, -1.0], [2.0, 2.0, 2.0], [-1.0, -1.0, -1.0]],
    [[-1.0, 2.0, -1.0], [-1.0, 2.0, -1.0], [-1.0, 2.0, -1.0]],
    [[2.0, -1.0, -1.0], [-1.0, 2.0, -1.0], [-1.0, -1.0, 2.0]],
    [[-1.0, -1.0, 2.0], [-1.0, 2.0, -1.0], [2.0, -1.0, -1.0]],
];

/// Maximum line-template response at every pixel.
///
/// Neighbors outside the grid or holding NaN contribute 0. Pixels that are
/// NaN themselves stay NaN.
pub fn enhance_lines(values: &Array2<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = values.dim();
    let at = |r: isize, c: isize| -> f64 {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            return 0.0;
        }
        let v = values[(r as usize, c as usize)];
        if v.is_finite() { v } else { 0.0 }
    };

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    if !values[(row, col)].is_finite() {
                        return f64::NAN;
                    }
                    LINE_TEMPLATES
                        .iter()
                        .map(|template| {
                            let mut sum = 0.0;
                            for (dr, weights) in template.iter().enumerate() {
                                for (dc, w) in weights.iter().enumerate() {
                                    sum += w * at(row as isize + dr as isize - 1, col as isize + dc as isize - 1);
                                }
                            }
                            sum / 6.0
                        })
                        .fold(f64::NEG_INFINITY, f64::max)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}
