//! Normalized difference indices
//!
//! All indices operate on single-band reflectance rasters and share
//! [`normalized_difference`], which adds a tiny constant to the denominator
//! so that two zero bands give 0 instead of a division by zero.

use crate::maybe_rayon::*;
use cloudmask_core::raster::Raster;
use cloudmask_core::{Error, Result};
use ndarray::Array2;

/// Added to every normalized difference denominator
pub const DENOMINATOR_EPSILON: f64 = 1e-7;

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b + 1e-7)`
///
/// Pixels where either band is nodata are set to NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }

                *out = (a - b) / (a + b + DENOMINATOR_EPSILON);
            }
            row_data
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// `NDSI = (Green - SWIR1) / (Green + SWIR1)`
///
/// Snow is bright in the visible and dark in the shortwave infrared.
pub fn ndsi(green: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, swir1)
}

/// `NDBI = (SWIR1 - NIR) / (SWIR1 + NIR)`
///
/// Positive over built-up areas and bare rock.
pub fn ndbi(swir1: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, nir)
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    b.ensure_shape(a.shape(), "second index band")
}

fn build_output(template: &Raster<f64>, rows: usize, cols: usize, data: Vec<f64>) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value)
    }

    #[test]
    fn test_ndvi_vegetation() {
        let nir = make_band(3, 3, 0.4);
        let red = make_band(3, 3, 0.05);
        let result = ndvi(&nir, &red).unwrap();
        let val = result.get(1, 1).unwrap();
        assert!((val - 0.35 / 0.45).abs() < 1e-6, "got {}", val);
    }

    #[test]
    fn test_zero_bands_give_zero() {
        let a = make_band(2, 2, 0.0);
        let result = normalized_difference(&a, &a).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_ndsi_snow_positive() {
        let green = make_band(2, 2, 0.6);
        let swir1 = make_band(2, 2, 0.1);
        let val = ndsi(&green, &swir1).unwrap().get(0, 0).unwrap();
        assert!(val > 0.7);
    }

    #[test]
    fn test_nodata_propagates() {
        let mut nir = make_band(2, 2, 0.3);
        nir.set_nodata(Some(-9999.0));
        nir.set(0, 1, -9999.0).unwrap();
        let swir1 = make_band(2, 2, 0.2);
        let result = ndbi(&swir1, &nir).unwrap();
        assert!(result.get(0, 1).unwrap().is_nan());
        assert!(!result.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(2, 2, 0.1);
        let b = make_band(2, 3, 0.1);
        assert!(normalized_difference(&a, &b).is_err());
    }
}
