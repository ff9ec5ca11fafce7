//! Potential shadow pixels
//!
//! Shadows are local darkenings in NIR and SWIR1. Hole filling raises every
//! dark basin to the level of its surroundings, so the fill depth is a
//! measure of how much darker a pixel is than its neighbourhood.

use cloudmask_core::{Raster, Result};
use ndarray::{Array2, Zip};

use crate::masking::bands::Scene;
use crate::morphology::fill_holes;
use crate::segmentation::{remove_small_objects, Connectivity};
use crate::statistics::masked_percentile;

/// Fill depth in reflectance that marks a pixel as darkened
const FILL_DEPTH_MIN: f64 = 0.05;
/// Percentile of clear-land reflectance used as the background for no-data pixels
const BACKGROUND_PERCENTILE: f64 = 17.5;
/// Shadow objects smaller than this are dropped
const MIN_SHADOW_AREA: usize = 3;

/// Fill depth of one band: `fill_holes(band) - band`.
///
/// No-data pixels are set to `background` before filling so that they
/// neither block the flood nor form holes of their own.
pub(crate) fn fill_depth(band: &Array2<f64>, background: f64) -> Result<Array2<f64>> {
    let prepared = band.mapv(|v| if v.is_finite() { v } else { background });
    let raster = Raster::from_array(prepared);
    let filled = fill_holes(&raster)?;
    Ok(Zip::from(filled.data())
        .and(raster.data())
        .map_collect(|&f, &v| f - v))
}

/// Potential cloud shadow layer.
///
/// `water` excludes water pixels, which are dark in both bands for other reasons.
pub(crate) fn potential_shadow(
    scene: &Scene,
    water: &Array2<bool>,
    clear_land: &Array2<bool>,
) -> Result<Array2<bool>> {
    let background = |band: &Array2<f64>| {
        masked_percentile(band, clear_land, BACKGROUND_PERCENTILE)
            .or_else(|| masked_percentile(band, &scene.valid, BACKGROUND_PERCENTILE))
            .unwrap_or(0.0)
    };

    let nir = scene.nir.data();
    let swir1 = scene.swir1.data();
    let nir_depth = fill_depth(nir, background(nir))?;
    let swir1_depth = fill_depth(swir1, background(swir1))?;

    let candidates = Zip::from(&nir_depth)
        .and(&swir1_depth)
        .and(&scene.valid)
        .and(water)
        .map_collect(|&n, &s, &ok, &w| ok && !w && n.min(s) > FILL_DEPTH_MIN);

    Ok(remove_small_objects(&candidates, MIN_SHADOW_AREA, Connectivity::Eight))
}
