//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, Zip};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid together with the
/// affine transform and an optional no-data sentinel.
///
/// # Example
///
/// ```ignore
/// use cloudmask_core::Raster;
///
/// let mut red: Raster<f64> = Raster::new(100, 100);
/// red.set_nodata(Some(f64::NAN));
/// red.set(10, 20, 0.08)?;
/// let value = red.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Create a raster with the same transform but a different cell type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            nodata: None,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail with [`Error::SizeMismatch`] unless this raster has the given shape.
    ///
    /// `layer` names the offending input in the error message.
    pub fn ensure_shape(&self, expected: (usize, usize), layer: &str) -> Result<()> {
        let (ar, ac) = self.shape();
        if (ar, ac) != expected {
            return Err(Error::SizeMismatch {
                layer: layer.to_string(),
                er: expected.0,
                ec: expected.1,
                ar,
                ac,
            });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Boolean grid that is `true` wherever the cell holds a usable value
    pub fn valid_mask(&self) -> Array2<bool> {
        self.data.mapv(|v| !v.is_nodata(self.nodata))
    }

    /// Convert every cell to `f64`, mapping no-data to NaN
    pub fn to_f64_array(&self) -> Array2<f64> {
        self.data.mapv(|v| {
            if v.is_nodata(self.nodata) {
                f64::NAN
            } else {
                v.to_f64().unwrap_or(f64::NAN)
            }
        })
    }

    /// Number of valid cells for which `pred` holds
    pub fn count_where<F>(&self, pred: F) -> usize
    where
        F: Fn(T) -> bool,
    {
        self.data
            .iter()
            .filter(|&&v| !v.is_nodata(self.nodata) && pred(v))
            .count()
    }

}

impl Raster<u8> {
    /// Build a 0/1 layer from a boolean grid, writing `nodata` where `valid` is false.
    pub fn from_bool(mask: &Array2<bool>, valid: &Array2<bool>, nodata: u8) -> Self {
        let mut data = Array2::zeros(mask.dim());
        Zip::from(&mut data)
            .and(mask)
            .and(valid)
            .for_each(|out, &m, &v| *out = if !v { nodata } else { u8::from(m) });
        let mut raster = Self::from_array(data);
        raster.set_nodata(Some(nodata));
        raster
    }

    /// Boolean grid that is `true` where the layer holds the value 1
    pub fn to_bool(&self) -> Array2<bool> {
        self.data.mapv(|v| v == 1)
    }
}
