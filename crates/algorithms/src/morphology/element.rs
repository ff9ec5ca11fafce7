//! Structuring element definitions for morphological operations

use cloudmask_core::raster::Neighborhood;

/// Shape of a structuring element for morphological operations.
///
/// A radius of 0 is the single center cell, which makes every
/// operation the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
    /// Square element of given radius (side = 2*radius + 1)
    Square(usize),
    /// Disk element of given radius
    Disk(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Square(1)
    }
}

impl StructuringElement {
    /// Get the radius of the structuring element
    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Square(r) | StructuringElement::Disk(r) => *r,
        }
    }

    /// Whether applying this element leaves the input unchanged
    pub fn is_identity(&self) -> bool {
        self.radius() == 0
    }

    /// Compute (dr, dc) offsets relative to center for all active cells
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match self {
            StructuringElement::Square(r) => Neighborhood::Square(*r).offsets(),
            StructuringElement::Disk(r) => Neighborhood::Circle(*r).offsets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_offsets() {
        let offsets = StructuringElement::Square(1).offsets();
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&(-1, -1)));
        assert!(offsets.contains(&(1, 1)));
    }

    #[test]
    fn test_disk_offsets() {
        let offsets = StructuringElement::Disk(1).offsets();
        // Center + 4 cardinal; diagonals are sqrt(2) away
        assert_eq!(offsets.len(), 5);
        assert!(!offsets.contains(&(1, 1)));
    }

    #[test]
    fn test_zero_radius_is_identity() {
        assert!(StructuringElement::Square(0).is_identity());
        assert_eq!(StructuringElement::Disk(0).offsets(), vec![(0, 0)]);
        assert!(!StructuringElement::default().is_identity());
    }
}
