//! Brightness temperature preparation
//!
//! Surface temperature falls with altitude, so in mountainous scenes a cold
//! summit looks like cloud. When an elevation grid is available the lapse
//! rate is estimated from the clear-sky reference and removed before any test
//! that depends on the temperature range.

use ndarray::{Array2, Zip};

use crate::statistics::{linear_regression, masked_values, percentile, LinearFit};

/// Minimum number of pixels with both BT and elevation before a lapse rate is fitted
const MIN_LAPSE_PIXELS: usize = 100;
/// Elevation stratum height used for sampling, metres
const LAPSE_STRATUM: f64 = 300.0;
/// Total number of regression samples spread over the strata
const LAPSE_SAMPLES: f64 = 40_000.0;
/// Percentiles bounding the clear-sky temperature range
pub(crate) const LOW_PERCENTILE: f64 = 17.5;
pub(crate) const HIGH_PERCENTILE: f64 = 82.5;
/// Margin added around the clear-sky temperature range, degrees C
pub(crate) const TEMPERATURE_MARGIN: f64 = 4.0;

/// Clear-sky temperature range of the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TemperatureBounds {
    /// P17.5 of the clear-sky reference minus the margin
    pub t_low: f64,
    /// P82.5 of the clear-sky reference plus the margin
    pub t_high: f64,
}

impl TemperatureBounds {
    /// Bounds from the temperatures selected by `reference`, or `None` if
    /// no finite temperature is selected.
    pub fn from_reference(bt: &Array2<f64>, reference: &Array2<bool>) -> Option<Self> {
        let mut values = masked_values(bt, reference);
        let low = percentile(&mut values, LOW_PERCENTILE)?;
        let high = percentile(&mut values, HIGH_PERCENTILE)?;
        Some(Self {
            t_low: low - TEMPERATURE_MARGIN,
            t_high: high + TEMPERATURE_MARGIN,
        })
    }
}

/// Outcome of lapse-rate normalisation
#[derive(Debug, Clone)]
pub(crate) struct NormalizedTemperature {
    pub bt: Array2<f64>,
    /// The fit, when one was attempted
    pub fit: Option<LinearFit>,
    /// Whether the fit was applied
    pub applied: bool,
}

/// Remove the elevation dependence of brightness temperature.
///
/// Samples are drawn from the clear-sky `reference` population (the one the
/// probability model is calibrated on) between its 17.5th and 82.5th BT
/// percentiles, an equal share from each 300 m elevation stratum. Within a
/// stratum the samples are evenly spaced in raster order, so the fit is
/// reproducible. The correction is applied only when temperature decreases
/// with height and the slope is significant.
pub(crate) fn normalize_temperature(
    bt: &Array2<f64>,
    dem: &Array2<f64>,
    reference: &Array2<bool>,
) -> NormalizedTemperature {
    let unchanged = |fit| NormalizedTemperature {
        bt: bt.clone(),
        fit,
        applied: false,
    };

    let both = Zip::from(bt).and(dem).map_collect(|&t, &z| t.is_finite() && z.is_finite());
    let mut heights = masked_values(dem, &both);
    if heights.len() < MIN_LAPSE_PIXELS {
        return unchanged(None);
    }
    let (Some(dem_base), Some(dem_top)) = (
        percentile(&mut heights, 0.0001),
        percentile(&mut heights, 99.999),
    ) else {
        return unchanged(None);
    };

    let used = Zip::from(&both).and(reference).map_collect(|&b, &r| b && r);
    let mut used_bt = masked_values(bt, &used);
    let (Some(bt_low), Some(bt_high)) = (
        percentile(&mut used_bt, LOW_PERCENTILE),
        percentile(&mut used_bt, HIGH_PERCENTILE),
    ) else {
        return unchanged(None);
    };

    let strata = (((dem_top - dem_base) / LAPSE_STRATUM).ceil() as usize).max(1);
    let per_stratum = (LAPSE_SAMPLES / strata as f64).round().max(1.0) as usize;

    let mut candidates: Vec<Vec<(f64, f64)>> = vec![Vec::new(); strata];
    Zip::from(bt).and(dem).and(&used).for_each(|&t, &z, &ok| {
        if ok && t > bt_low && t < bt_high && z >= dem_base && z <= dem_top {
            let k = (((z - dem_base) / LAPSE_STRATUM) as usize).min(strata - 1);
            candidates[k].push((z, t));
        }
    });

    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    for stratum in &candidates {
        let n = stratum.len();
        let take = n.min(per_stratum);
        for i in 0..take {
            let (z, t) = stratum[i * n / take];
            xs.push(z);
            ys.push(t);
        }
    }

    let fit = linear_regression(&xs, &ys);
    match fit {
        Some(f) if f.slope < 0.0 && f.is_significant() => {
            let bt = Zip::from(bt).and(dem).map_collect(|&t, &z| {
                if z.is_finite() {
                    t - f.slope * (z - dem_base)
                } else {
                    t
                }
            });
            NormalizedTemperature {
                bt,
                fit,
                applied: true,
            }
        }
        _ => unchanged(fit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 20x20 scene: temperature drops 6.5 C per km across a 0-1900 m ramp
    fn mountain() -> (Array2<f64>, Array2<f64>) {
        let dem = Array2::from_shape_fn((20, 20), |(r, _)| r as f64 * 100.0);
        let bt = Array2::from_shape_fn((20, 20), |(r, c)| {
            25.0 - 0.0065 * r as f64 * 100.0 + (c % 3) as f64 * 0.1
        });
        (bt, dem)
    }

    #[test]
    fn test_lapse_rate_removed() {
        let (bt, dem) = mountain();
        let clear = Array2::from_elem((20, 20), true);
        let out = normalize_temperature(&bt, &dem, &clear);

        assert!(out.applied);
        let fit = out.fit.unwrap();
        assert!((fit.slope + 0.0065).abs() < 1e-3);
        // summit now about as warm as the valley floor
        assert!((out.bt[(19, 0)] - out.bt[(0, 0)]).abs() < 0.5);
    }

    #[test]
    fn test_warming_with_height_is_not_applied() {
        let (bt, dem) = mountain();
        let inverted = bt.mapv(|t| 50.0 - t);
        let clear = Array2::from_elem((20, 20), true);
        let out = normalize_temperature(&inverted, &dem, &clear);
        assert!(!out.applied);
        assert_eq!(out.bt, inverted);
    }

    #[test]
    fn test_too_few_pixels_skips_fit() {
        let bt = Array2::from_elem((5, 5), 10.0);
        let dem = Array2::from_elem((5, 5), 100.0);
        let clear = Array2::from_elem((5, 5), true);
        let out = normalize_temperature(&bt, &dem, &clear);
        assert!(out.fit.is_none());
        assert!(!out.applied);
    }

    #[test]
    fn test_bounds_from_reference() {
        let bt = Array2::from_shape_fn((1, 5), |(_, c)| c as f64);
        let reference = Array2::from_elem((1, 5), true);
        let bounds = TemperatureBounds::from_reference(&bt, &reference).unwrap();
        assert!((bounds.t_low - (0.7 - 4.0)).abs() < 1e-12);
        assert!((bounds.t_high - (3.3 + 4.0)).abs() < 1e-12);

        let none = Array2::from_elem((1, 5), false);
        assert!(TemperatureBounds::from_reference(&bt, &none).is_none());
    }
}
