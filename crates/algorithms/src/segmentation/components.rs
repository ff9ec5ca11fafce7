//! Connected-component labelling
//!
//! Breadth-first flood fill over a boolean mask. Labels are assigned in
//! raster scan order of each component's first pixel, starting at 1, so
//! labelling the same mask twice always yields the same arena.

use cloudmask_core::raster::Neighborhood;
use ndarray::Array2;
use std::collections::VecDeque;

/// Pixel adjacency used when growing components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbors only
    Four,
    /// Edge and corner neighbors
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> Vec<(isize, isize)> {
        match self {
            Connectivity::Four => Neighborhood::Rook3x3.offsets_no_center(),
            Connectivity::Eight => Neighborhood::Queen3x3.offsets_no_center(),
        }
    }
}

/// Inclusive pixel bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BoundingBox {
    fn point(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }
}

/// One connected component
#[derive(Debug, Clone)]
pub struct Component {
    /// Label in the owning label grid (1-based)
    pub label: u32,
    /// Member pixels as (row, col)
    pub pixels: Vec<(usize, usize)>,
    pub bbox: BoundingBox,
    /// Mean (row, col) of the member pixels
    pub centroid: (f64, f64),
}

impl Component {
    /// Number of pixels in the component
    pub fn area(&self) -> usize {
        self.pixels.len()
    }
}

/// Arena of components plus the label grid they were extracted from.
#[derive(Debug, Clone)]
pub struct Components {
    /// Label per pixel, 0 for background
    pub labels: Array2<u32>,
    /// Components indexed by `label - 1`
    pub objects: Vec<Component>,
}

impl Components {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.objects.iter()
    }

    /// Look up a component by label
    pub fn get(&self, label: u32) -> Option<&Component> {
        label
            .checked_sub(1)
            .and_then(|i| self.objects.get(i as usize))
    }

    /// Boolean mask of the components for which `keep` returns true
    pub fn mask_where<F>(&self, keep: F) -> Array2<bool>
    where
        F: Fn(&Component) -> bool,
    {
        let mut mask = Array2::from_elem(self.labels.dim(), false);
        for component in self.objects.iter().filter(|c| keep(c)) {
            for &(r, c) in &component.pixels {
                mask[(r, c)] = true;
            }
        }
        mask
    }
}

/// Label the connected `true` regions of a mask.
pub fn label_components(mask: &Array2<bool>, connectivity: Connectivity) -> Components {
    let (rows, cols) = mask.dim();
    let offsets = connectivity.offsets();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut objects = Vec::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[(row, col)] || labels[(row, col)] != 0 {
                continue;
            }

            let label = objects.len() as u32 + 1;
            labels[(row, col)] = label;
            queue.push_back((row, col));

            let mut pixels = Vec::new();
            let mut bbox = BoundingBox::point(row, col);
            let (mut sum_r, mut sum_c) = (0.0, 0.0);

            while let Some((r, c)) = queue.pop_front() {
                pixels.push((r, c));
                bbox.include(r, c);
                sum_r += r as f64;
                sum_c += c as f64;

                for &(dr, dc) in &offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if mask[(nr, nc)] && labels[(nr, nc)] == 0 {
                        labels[(nr, nc)] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }

            let n = pixels.len() as f64;
            objects.push(Component {
                label,
                pixels,
                bbox,
                centroid: (sum_r / n, sum_c / n),
            });
        }
    }

    Components { labels, objects }
}

/// Drop connected regions with fewer than `min_size` pixels.
pub fn remove_small_objects(
    mask: &Array2<bool>,
    min_size: usize,
    connectivity: Connectivity,
) -> Array2<bool> {
    if min_size <= 1 {
        return mask.clone();
    }
    label_components(mask, connectivity).mask_where(|c| c.area() >= min_size)
}
