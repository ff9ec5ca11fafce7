//! Binary morphological erosion
//!
//! A foreground cell survives only when every cell under the structuring
//! element is foreground. Cells outside the raster count as foreground, so
//! objects touching the scene edge are not eaten away from that side.

use cloudmask_core::Result;
use ndarray::Array2;

use super::dilate::dilate_mask;
use super::element::StructuringElement;

/// Erode a boolean grid.
///
/// Both supported elements are symmetric, so erosion is the complement of
/// dilating the complement.
pub fn erode_mask(mask: &Array2<bool>, element: &StructuringElement) -> Result<Array2<bool>> {
    if element.is_identity() {
        return Ok(mask.clone());
    }
    let background = mask.mapv(|v| !v);
    Ok(dilate_mask(&background, element)?.mapv(|v| !v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn block(size: usize, lo: usize, hi: usize) -> Array2<bool> {
        let mut mask = Array2::from_elem((size, size), false);
        mask.slice_mut(s![lo..hi, lo..hi]).fill(true);
        mask
    }

    #[test]
    fn test_erode_shrinks_block() {
        let shrunk = erode_mask(&block(9, 2, 7), &StructuringElement::Square(1)).unwrap();
        // 5x5 block loses its one-pixel rim
        assert_eq!(shrunk.iter().filter(|&&v| v).count(), 9);
        assert!(shrunk[(4, 4)]);
        assert!(!shrunk[(2, 2)]);
    }

    #[test]
    fn test_erode_removes_thin_line() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask.row_mut(2).fill(true);
        let shrunk = erode_mask(&mask, &StructuringElement::Disk(1)).unwrap();
        assert!(shrunk.iter().all(|&v| !v));
    }

    #[test]
    fn test_scene_edge_counts_as_foreground() {
        let full = Array2::from_elem((4, 4), true);
        let shrunk = erode_mask(&full, &StructuringElement::Square(1)).unwrap();
        assert_eq!(shrunk, full);
    }

    #[test]
    fn test_erode_then_dilate_restores_square() {
        let mask = block(11, 3, 8);
        let element = StructuringElement::Square(1);
        let opened = dilate_mask(&erode_mask(&mask, &element).unwrap(), &element).unwrap();
        assert_eq!(opened, mask);
    }
}
