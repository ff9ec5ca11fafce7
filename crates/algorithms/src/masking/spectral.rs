//! Spectral indices and per-pixel cloud tests
//!
//! Every test layer is `false` outside the valid area and every index is NaN
//! there, so downstream stages can combine them without re-checking validity.

use cloudmask_core::raster::Raster;
use cloudmask_core::Result;
use ndarray::{Array2, Zip};

use super::bands::Scene;
use super::layer::par_cells;
use crate::imagery::{ndbi, ndsi, ndvi};
use crate::statistics::focal_variance;

/// NDSI and NDVI must both stay below this for the basic test
const BASIC_INDEX_MAX: f64 = 0.8;
/// Minimum SWIR2 reflectance of a cloud
const BASIC_SWIR2_MIN: f64 = 0.03;
/// Warmest brightness temperature (C) a cloud may have
const BASIC_BT_MAX: f64 = 27.0;
const WHITENESS_MAX: f64 = 0.7;
/// HOT = blue - HOT_RED_WEIGHT * red - HOT_OFFSET
const HOT_RED_WEIGHT: f64 = 0.5;
const HOT_OFFSET: f64 = 0.08;
/// NIR / SWIR1 above this excludes bright rock and desert
const RATIO_MIN: f64 = 0.75;
/// Window radius of the focal variances behind the CDI (7x7)
const CDI_RADIUS: usize = 3;

/// Derived indices and per-pixel test layers of a scene
#[derive(Debug, Clone)]
pub(crate) struct SpectralLayers {
    pub ndvi: Array2<f64>,
    pub ndsi: Array2<f64>,
    pub ndbi: Array2<f64>,
    pub whiteness: Array2<f64>,
    pub hot: Array2<f64>,
    /// Cloud displacement index; `None` without the red-edge bands
    pub cdi: Option<Array2<f64>>,
    pub basic: Array2<bool>,
    pub whiteness_test: Array2<bool>,
    pub haze: Array2<bool>,
    pub ratio: Array2<bool>,
    /// Spectral water test, before any cloud or snow exclusion
    pub water: Array2<bool>,
}

/// Compute all indices and test layers for a scene.
pub(crate) fn spectral_layers(scene: &Scene) -> Result<SpectralLayers> {
    let ndvi = ndvi(&scene.nir, &scene.red)?.into_array();
    let ndsi = ndsi(&scene.green, &scene.swir1)?.into_array();
    let ndbi = ndbi(&scene.swir1, &scene.nir)?.into_array();

    let shape = scene.shape();
    let whiteness = par_cells(shape, |r, c| {
        if !scene.valid[(r, c)] {
            return f64::NAN;
        }
        if scene.saturated[(r, c)] {
            return 0.0;
        }
        let (b, g, red) = unsafe {
            (
                scene.blue.get_unchecked(r, c),
                scene.green.get_unchecked(r, c),
                scene.red.get_unchecked(r, c),
            )
        };
        whiteness_index(b, g, red)
    })?;

    let hot = par_cells(shape, |r, c| {
        let (b, red) = unsafe { (scene.blue.get_unchecked(r, c), scene.red.get_unchecked(r, c)) };
        b - HOT_RED_WEIGHT * red - HOT_OFFSET
    })?;

    let basic = par_cells(shape, |r, c| {
        if !scene.valid[(r, c)] {
            return false;
        }
        let swir2 = unsafe { scene.swir2.get_unchecked(r, c) };
        let cold_enough = scene
            .thermal
            .as_ref()
            .is_none_or(|bt| unsafe { bt.get_unchecked(r, c) } < BASIC_BT_MAX);
        ndsi[(r, c)] < BASIC_INDEX_MAX
            && ndvi[(r, c)] < BASIC_INDEX_MAX
            && swir2 > BASIC_SWIR2_MIN
            && cold_enough
    })?;

    let whiteness_test = Zip::from(&whiteness)
        .and(&scene.valid)
        .map_collect(|&w, &ok| ok && w < WHITENESS_MAX);

    let haze = Zip::from(&hot)
        .and(&scene.saturated)
        .and(&scene.valid)
        .map_collect(|&h, &sat, &ok| ok && (h > 0.0 || sat));

    let ratio = par_cells(shape, |r, c| {
        let (nir, swir1) = unsafe { (scene.nir.get_unchecked(r, c), scene.swir1.get_unchecked(r, c)) };
        scene.valid[(r, c)] && nir / swir1 > RATIO_MIN
    })?;

    let water = par_cells(shape, |r, c| {
        scene.valid[(r, c)] && water_test(ndvi[(r, c)], unsafe { scene.nir.get_unchecked(r, c) })
    })?;

    let cdi = match (&scene.red_edge3, &scene.narrow_nir) {
        (Some(re3), Some(n8a)) => Some(cloud_displacement_index(&scene.nir, re3, n8a, &scene.valid)?),
        _ => None,
    };

    Ok(SpectralLayers {
        ndvi,
        ndsi,
        ndbi,
        whiteness,
        hot,
        cdi,
        basic,
        whiteness_test,
        haze,
        ratio,
        water,
    })
}

/// Mean absolute deviation of the visible bands relative to their mean.
///
/// A non-positive visible mean gives 1, which fails the whiteness test.
pub(crate) fn whiteness_index(blue: f64, green: f64, red: f64) -> f64 {
    let m = (blue + green + red) / 3.0;
    if m <= 0.0 {
        return 1.0;
    }
    ((blue - m).abs() + (green - m).abs() + (red - m).abs()) / m
}

/// Spectral water test on NDVI and NIR reflectance
pub(crate) fn water_test(ndvi: f64, nir: f64) -> bool {
    (ndvi < 0.01 && nir < 0.11) || (ndvi > 0.0 && ndvi < 0.1 && nir < 0.05)
}

/// Cloud displacement index (Frantz et al., 2018).
///
/// Clouds are smooth in both ratio images while bright ground shows
/// parallax-driven texture in the NIR ratio, so CDI is strongly negative over
/// cloud and near zero or positive over bright surfaces.
fn cloud_displacement_index(
    nir: &Raster<f64>,
    red_edge3: &Raster<f64>,
    narrow_nir: &Raster<f64>,
    valid: &Array2<bool>,
) -> Result<Array2<f64>> {
    let ratio = |num: &Raster<f64>| -> Raster<f64> {
        let data = Zip::from(num.data())
            .and(narrow_nir.data())
            .map_collect(|&a, &b| {
                let q = a / b;
                if q.is_finite() { q } else { f64::NAN }
            });
        let mut out = Raster::from_array(data);
        out.set_nodata(Some(f64::NAN));
        out
    };

    let v8 = focal_variance(&ratio(nir), CDI_RADIUS)?;
    let v7 = focal_variance(&ratio(red_edge3), CDI_RADIUS)?;

    Ok(Zip::from(v7.data())
        .and(v8.data())
        .and(valid)
        .map_collect(|&a, &b, &ok| {
            if !ok || a.is_nan() || b.is_nan() {
                f64::NAN
            } else if a + b == 0.0 {
                0.0
            } else {
                (a - b) / (a + b)
            }
        }))
}
