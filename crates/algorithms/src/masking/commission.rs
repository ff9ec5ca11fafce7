//! Removal of bright-surface commission errors from the cloud layer
//!
//! Urban areas, bright rock, coastlines and snowy mountains pass many cloud
//! tests. They are collected into a potential false-positive layer, and cloud
//! pixels that only survive as thin structures over that layer are dropped.
//! Built-up areas show as lines in NDBI, so the index is line-enhanced
//! before the false-positive test.

use cloudmask_core::{Error, Result};
use ndarray::{Array2, Zip};

use super::bands::Scene;
use super::layer::{and, or, to_raster};
use super::spectral::SpectralLayers;
use crate::imagery::enhance_lines;
use crate::morphology::{dilate_mask, erode_mask, StructuringElement};
use crate::segmentation::{label_components, remove_small_objects, Connectivity};
use crate::statistics::{otsu_threshold, OTSU_BINS};
use crate::terrain::{slope, SlopeParams, SlopeUnits};

/// Half-width of the square that grows the false-positive layer, metres
const FALSE_POSITIVE_BUFFER: f64 = 250.0;
/// Radius of the erosion that separates thin structures from clouds, metres
const EROSION_RADIUS: f64 = 90.0;
/// Slope above which snow counts as a likely false positive, degrees
const STEEP_SNOW_SLOPE: f64 = 20.0;
/// CDI below this marks a pixel as certainly cloud
const CDI_CLOUD: f64 = -0.8;
/// Small objects are kept only if some pixel has CDI below this
const CDI_OBJECT: f64 = -0.5;
/// Objects smaller than this are checked against the CDI
const CDI_OBJECT_AREA: usize = 10_000;
/// Cloud objects smaller than this are always removed
const MIN_CLOUD_AREA: usize = 3;

/// Layers the commission filter reads besides the cloud layer itself
pub(crate) struct CommissionInputs<'a> {
    pub scene: &'a Scene,
    pub spectral: &'a SpectralLayers,
    /// Brightness temperature after lapse-rate normalisation
    pub bt: Option<&'a Array2<f64>>,
    /// Spectral snow test, before cloud exclusion
    pub snow: &'a Array2<bool>,
}

/// Clean `cloud` and return the filtered layer.
pub(crate) fn remove_commission(cloud: &Array2<bool>, inputs: &CommissionInputs<'_>) -> Result<Array2<bool>> {
    let scene = inputs.scene;
    let spectral = inputs.spectral;
    let resolution = scene.geometry.resolution;

    let mut false_positive = false_positives(inputs, cloud)?;

    let buffer = (FALSE_POSITIVE_BUFFER / resolution) as usize;
    false_positive = dilate_mask(&false_positive, &StructuringElement::Square(buffer))?;
    false_positive = and(&or(&false_positive, inputs.snow), &scene.valid);

    // Only pixels lost to the erosion that also lie on a false positive are
    // dropped; clouds clear of false positives pass through whole.
    let radius = (EROSION_RADIUS / resolution).round() as usize;
    let eroded = erode_mask(cloud, &StructuringElement::Disk(radius))?;
    let stripped = Zip::from(cloud)
        .and(&eroded)
        .and(&false_positive)
        .map_collect(|&c, &core, &fp| c && (core || !fp));

    let regrown = dilate_mask(&stripped, &StructuringElement::Disk(2 * radius))?;
    let surviving = label_components(cloud, Connectivity::Eight)
        .mask_where(|c| c.pixels.iter().any(|&p| stripped[p]));
    let mut filtered = and(&regrown, &surviving);

    // Water has no bright-surface confusion; keep its cloud untouched.
    let cloud_over_water = and(cloud, &spectral.water);
    filtered = or(&filtered, &cloud_over_water);

    if let Some(cdi) = &spectral.cdi {
        let components = label_components(&filtered, Connectivity::Eight);
        filtered = components.mask_where(|c| {
            c.area() >= CDI_OBJECT_AREA || c.pixels.iter().any(|&p| cdi[p] < CDI_OBJECT)
        });
    }

    Ok(remove_small_objects(&filtered, MIN_CLOUD_AREA, Connectivity::Eight))
}

/// Bright non-water surfaces that are probably not cloud.
fn false_positives(inputs: &CommissionInputs<'_>, cloud: &Array2<bool>) -> Result<Array2<bool>> {
    let scene = inputs.scene;
    let spectral = inputs.spectral;

    let ndbi = enhance_lines(&spectral.ndbi)?;
    let mut fp = Zip::from(&ndbi)
        .and(&spectral.ndvi)
        .and(&spectral.water)
        .and(&scene.valid)
        .map_collect(|&b, &v, &w, &ok| ok && !w && b > 0.0 && b > v);

    // Keep only false positives that are as warm as the warm mode of the
    // bright pixels; cold ones are likely real cloud.
    if let Some(bt) = inputs.bt {
        let candidates = or(&fp, cloud);
        let samples: Vec<f64> = Zip::from(bt)
            .and(&candidates)
            .fold(Vec::new(), |mut acc, &t, &m| {
                if m && t.is_finite() {
                    acc.push(t);
                }
                acc
            });
        if let Some(threshold) = otsu_threshold(&samples, OTSU_BINS) {
            let warm_floor = samples
                .iter()
                .copied()
                .filter(|&t| t > threshold)
                .reduce(f64::min);
            if let Some(floor) = warm_floor {
                Zip::from(&mut fp).and(bt).for_each(|f, &t| *f &= t >= floor);
            }
        }
    }

    if let Some(cdi) = &spectral.cdi {
        Zip::from(&mut fp).and(cdi).for_each(|f, &d| *f &= d.is_nan() || d >= CDI_CLOUD);
    }

    if let Some(dem) = &scene.elevation {
        let dem = to_raster(dem.clone(), scene.transform);
        let slope = slope(
            &dem,
            SlopeParams {
                units: SlopeUnits::Degrees,
                cell_size: Some(scene.geometry.resolution),
            },
        )
        .map_err(|e| Error::Algorithm(format!("slope of elevation layer: {}", e)))?;
        Zip::from(&mut fp)
            .and(inputs.snow)
            .and(slope.data())
            .for_each(|f, &s, &deg| *f |= s && deg > STEEP_SNOW_SLOPE);
    }

    Ok(fp)
}
