//! Focal (moving window) statistics
//!
//! Computes a statistic over a square window centered on each cell.

use crate::maybe_rayon::*;
use cloudmask_core::raster::Raster;
use cloudmask_core::{Error, Result};
use ndarray::Array2;

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocalStatistic {
    /// Arithmetic mean
    Mean,
    /// Population variance
    Variance,
}

/// How cells outside the raster (and no-data cells inside the window) are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocalPadding {
    /// Skip them; the statistic uses the valid cells only
    #[default]
    Ignore,
    /// Count them as zeros over the full window, like a uniform filter with constant padding
    Zero,
}

/// Parameters for focal statistics
#[derive(Debug, Clone)]
pub struct FocalParams {
    /// Window radius (actual window size = 2*radius + 1)
    pub radius: usize,
    /// Statistic to compute
    pub statistic: FocalStatistic,
    pub padding: FocalPadding,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            radius: 1,
            statistic: FocalStatistic::Mean,
            padding: FocalPadding::Ignore,
        }
    }
}

/// Compute focal statistics on a raster.
///
/// Cells whose own value is no-data stay NaN in the output.
pub fn focal_statistics(raster: &Raster<f64>, params: FocalParams) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::Algorithm("Focal radius must be > 0".into()));
    }

    let (rows, cols) = raster.shape();
    let r = params.radius as isize;
    let window = ((2 * r + 1) * (2 * r + 1)) as f64;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(center) {
                    continue;
                }

                let mut sum = 0.0;
                let mut sum_sq = 0.0;
                let mut count = 0usize;

                for dr in -r..=r {
                    for dc in -r..=r {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                            continue;
                        }
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if raster.is_nodata(v) {
                            continue;
                        }
                        sum += v;
                        sum_sq += v * v;
                        count += 1;
                    }
                }

                let n = match params.padding {
                    FocalPadding::Ignore => count as f64,
                    FocalPadding::Zero => window,
                };
                if n == 0.0 {
                    continue;
                }

                let mean = sum / n;
                *out = match params.statistic {
                    FocalStatistic::Mean => mean,
                    FocalStatistic::Variance => sum_sq / n - mean * mean,
                };
            }

            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Focal variance with zero padding, the texture measure behind the cloud
/// displacement index.
pub fn focal_variance(raster: &Raster<f64>, radius: usize) -> Result<Raster<f64>> {
    focal_statistics(
        raster,
        FocalParams {
            radius,
            statistic: FocalStatistic::Variance,
            padding: FocalPadding::Zero,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudmask_core::GeoTransform;

    fn uniform_raster(size: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(size, size, value);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        r
    }

    fn gradient_raster(size: usize) -> Raster<f64> {
        let mut r = Raster::new(size, size);
        for row in 0..size {
            for col in 0..size {
                r.set(row, col, (row * size + col) as f64).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_focal_mean_uniform() {
        let r = uniform_raster(10, 5.0);
        let result = focal_statistics(&r, FocalParams::default()).unwrap();
        let v = result.get(0, 0).unwrap();
        assert!((v - 5.0).abs() < 1e-10, "Mean of uniform should be 5.0, got {}", v);
    }

    #[test]
    fn test_variance_of_uniform_interior_is_zero() {
        let r = uniform_raster(10, 3.0);
        let result = focal_variance(&r, 3).unwrap();
        let v = result.get(5, 5).unwrap();
        assert!(v.abs() < 1e-10, "Variance of uniform should be 0, got {}", v);
    }

    #[test]
    fn test_zero_padding_shows_at_corner() {
        let r = uniform_raster(10, 1.0);
        let result = focal_variance(&r, 1).unwrap();
        // corner window: 4 ones and 5 zeros -> mean 4/9, mean square 4/9
        let expected = 4.0 / 9.0 - (4.0 / 9.0) * (4.0 / 9.0);
        let v = result.get(0, 0).unwrap();
        assert!((v - expected).abs() < 1e-10, "got {}", v);
    }

    #[test]
    fn test_variance_of_gradient() {
        let r = gradient_raster(10);
        let result = focal_statistics(&r, FocalParams {
            radius: 1,
            statistic: FocalStatistic::Variance,
            padding: FocalPadding::Ignore,
        }).unwrap();
        // window values 44..66 offsets {-11,-10,-9,-1,0,1,9,10,11}: variance = 606/9
        let v = result.get(5, 5).unwrap();
        assert!((v - 606.0 / 9.0).abs() < 1e-9, "got {}", v);
    }

    #[test]
    fn test_nodata_center_stays_nan() {
        let mut r = uniform_raster(5, 1.0);
        r.set(2, 2, f64::NAN).unwrap();
        let result = focal_variance(&r, 1).unwrap();
        assert!(result.get(2, 2).unwrap().is_nan());
        assert!(!result.get(2, 1).unwrap().is_nan());
    }

    #[test]
    fn test_focal_radius_zero_error() {
        let r = uniform_raster(5, 1.0);
        assert!(focal_variance(&r, 0).is_err());
    }
}
