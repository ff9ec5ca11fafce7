//! Grey-level hole filling
//!
//! Raises every regional minimum that is not connected to the raster border
//! up to the lowest value on its rim, like `imfill` on a grey image. This is
//! morphological reconstruction by erosion seeded from the border, computed
//! with a border-seeded priority flood (Barnes et al., 2014) and no gradient
//! enforcement.

use cloudmask_core::raster::Raster;
use cloudmask_core::{Error, Result};
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Queue entry ordered so that `BinaryHeap` pops the lowest level first.
#[derive(Debug, Clone, Copy)]
struct Cell {
    level: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .total_cmp(&self.level)
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

const D8_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Fill holes in a grey-level raster.
///
/// Border cells keep their value. No-data cells are copied through
/// unchanged and act as barriers: the flood never passes through them, so
/// callers that want them filled should replace them with a background
/// value first.
pub fn fill_holes(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let mut output = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    for row in 0..rows {
        for col in 0..cols {
            let val = unsafe { raster.get_unchecked(row, col) };

            if raster.is_nodata(val) {
                visited[(row, col)] = true;
                output[(row, col)] = val;
                continue;
            }

            if row == 0 || row == rows - 1 || col == 0 || col == cols - 1 {
                heap.push(Cell { level: val, row, col });
                visited[(row, col)] = true;
                output[(row, col)] = val;
            }
        }
    }

    while let Some(cell) = heap.pop() {
        for &(dr, dc) in &D8_OFFSETS {
            let nr = cell.row as isize + dr;
            let nc = cell.col as isize + dc;

            if nr < 0 || nc < 0 || (nr as usize) >= rows || (nc as usize) >= cols {
                continue;
            }

            let (nr, nc) = (nr as usize, nc as usize);
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let value = unsafe { raster.get_unchecked(nr, nc) };
            let filled = value.max(cell.level);

            output[(nr, nc)] = filled;
            heap.push(Cell {
                level: filled,
                row: nr,
                col: nc,
            });
        }
    }

    // Cells walled off by no-data never get reached; keep their own value.
    ndarray::Zip::from(&mut output)
        .and(&visited)
        .and(raster.data())
        .for_each(|out, &seen, &v| {
            if !seen {
                *out = v;
            }
        });

    let mut result = raster.with_same_meta::<f64>(rows, cols);
    result.set_nodata(nodata);
    *result.data_mut() = output;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fill_single_pit() {
        let raster = Raster::from_array(array![
            [5.0, 5.0, 5.0, 5.0, 5.0],
            [5.0, 4.0, 4.0, 4.0, 5.0],
            [5.0, 4.0, 1.0, 4.0, 5.0],
            [5.0, 4.0, 4.0, 4.0, 5.0],
            [5.0, 5.0, 5.0, 5.0, 5.0],
        ]);

        let filled = fill_holes(&raster).unwrap();
        for row in 1..4 {
            for col in 1..4 {
                let v = filled.get(row, col).unwrap();
                assert!((v - 5.0).abs() < 1e-10, "({row},{col}) = {v}");
            }
        }
    }

    #[test]
    fn test_border_connected_valley_is_kept() {
        let raster = Raster::from_array(array![
            [5.0, 1.0, 5.0],
            [5.0, 1.0, 5.0],
            [5.0, 1.0, 5.0],
        ]);
        let filled = fill_holes(&raster).unwrap();
        assert_eq!(filled.data(), raster.data());
    }

    #[test]
    fn test_fill_rises_to_lowest_spill_point() {
        let raster = Raster::from_array(array![
            [9.0, 9.0, 9.0, 9.0],
            [9.0, 2.0, 2.0, 3.0],
            [9.0, 9.0, 9.0, 9.0],
        ]);
        let filled = fill_holes(&raster).unwrap();
        assert!((filled.get(1, 1).unwrap() - 3.0).abs() < 1e-10);
        assert!((filled.get(1, 3).unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_nodata_is_preserved() {
        let mut raster = Raster::from_array(array![
            [5.0, 5.0, 5.0],
            [5.0, -9999.0, 5.0],
            [5.0, 5.0, 5.0],
        ]);
        raster.set_nodata(Some(-9999.0));
        let filled = fill_holes(&raster).unwrap();
        assert_eq!(filled.get(1, 1).unwrap(), -9999.0);
    }
}
