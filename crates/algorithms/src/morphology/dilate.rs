//! Binary morphological dilation
//!
//! A cell becomes foreground when any cell under the structuring element,
//! centered on it, is foreground. Cells outside the raster contribute nothing.

use crate::maybe_rayon::*;
use cloudmask_core::{Error, Result};
use ndarray::Array2;

use super::element::StructuringElement;

/// Dilate a boolean grid.
///
/// Square elements are applied as two separable 1-D passes; disks walk
/// their offset list.
pub fn dilate_mask(mask: &Array2<bool>, element: &StructuringElement) -> Result<Array2<bool>> {
    if element.is_identity() {
        return Ok(mask.clone());
    }

    match element {
        StructuringElement::Square(r) => {
            let horizontal = sweep_rows(mask, *r)?;
            sweep_cols(&horizontal, *r)
        }
        StructuringElement::Disk(_) => dilate_offsets(mask, &element.offsets()),
    }
}

fn sweep_rows(mask: &Array2<bool>, radius: usize) -> Result<Array2<bool>> {
    let (rows, cols) = mask.dim();

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            // prefix[c] = foreground count in columns [0, c)
            let mut prefix = vec![0usize; cols + 1];
            for col in 0..cols {
                prefix[col + 1] = prefix[col] + usize::from(mask[(row, col)]);
            }

            (0..cols)
                .map(|col| {
                    let lo = col.saturating_sub(radius);
                    let hi = (col + radius + 1).min(cols);
                    prefix[hi] > prefix[lo]
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

fn sweep_cols(mask: &Array2<bool>, radius: usize) -> Result<Array2<bool>> {
    let (rows, cols) = mask.dim();

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let lo = row.saturating_sub(radius);
            let hi = (row + radius + 1).min(rows);

            (0..cols)
                .map(|col| (lo..hi).any(|r| mask[(r, col)]))
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

fn dilate_offsets(mask: &Array2<bool>, offsets: &[(isize, isize)]) -> Result<Array2<bool>> {
    let (rows, cols) = mask.dim();

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    offsets.iter().any(|&(dr, dc)| {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        nr >= 0
                            && nc >= 0
                            && (nr as usize) < rows
                            && (nc as usize) < cols
                            && mask[(nr as usize, nc as usize)]
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}
