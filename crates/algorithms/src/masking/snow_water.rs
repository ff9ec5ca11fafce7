//! Snow and water identification

use cloudmask_core::Result;
use ndarray::{Array2, Zip};

use super::bands::Scene;
use super::config::ClassifyConfig;
use super::layer::par_cells;
use super::spectral::SpectralLayers;
use crate::statistics::{masked_values, percentile};

const SNOW_NDSI_MIN: f64 = 0.15;
const SNOW_NIR_MIN: f64 = 0.11;
const SNOW_GREEN_MIN: f64 = 0.10;
/// Warmest brightness temperature (C) snow may have
const SNOW_BT_MAX: f64 = 10.0;
/// Percentile of occurrence over spectral water used to derive the override threshold
const OCCURRENCE_PERCENTILE: f64 = 17.5;
const OCCURRENCE_MARGIN: f64 = 5.0;
/// Upper bound (and no-water default) of the derived override threshold
const OCCURRENCE_CAP: f64 = 90.0;

/// Spectral snow test, before cloud exclusion
pub(crate) fn snow_test(scene: &Scene, spectral: &SpectralLayers) -> Result<Array2<bool>> {
    par_cells(scene.shape(), |r, c| {
        if !scene.valid[(r, c)] {
            return false;
        }
        let (nir, green) = unsafe { (scene.nir.get_unchecked(r, c), scene.green.get_unchecked(r, c)) };
        let cold = scene
            .thermal
            .as_ref()
            .is_none_or(|bt| unsafe { bt.get_unchecked(r, c) } < SNOW_BT_MAX);
        spectral.ndsi[(r, c)] > SNOW_NDSI_MIN && nir > SNOW_NIR_MIN && green > SNOW_GREEN_MIN && cold
    })
}

#[derive(Debug, Clone)]
pub(crate) struct SnowWater {
    pub snow: Array2<bool>,
    pub water: Array2<bool>,
    /// Occurrence threshold actually applied; `None` when the override is off
    pub occurrence_threshold: Option<f64>,
}

/// Final snow and water layers given the cloud layer.
pub(crate) fn snow_and_water(
    scene: &Scene,
    spectral: &SpectralLayers,
    snow_test: &Array2<bool>,
    cloud: &Array2<bool>,
    config: &ClassifyConfig,
) -> SnowWater {
    let snow = Zip::from(snow_test).and(cloud).map_collect(|&s, &c| s && !c);

    let mut water = Zip::from(&spectral.water)
        .and(cloud)
        .and(&snow)
        .map_collect(|&w, &c, &s| w && !c && !s);

    let occurrence_threshold = scene.water_occurrence.as_ref().and_then(|occurrence| {
        let threshold = config
            .water_occurrence_threshold
            .unwrap_or_else(|| derived_threshold(occurrence, &spectral.water));
        (threshold >= 0.0).then_some(threshold)
    });

    if let (Some(occurrence), Some(threshold)) = (&scene.water_occurrence, occurrence_threshold) {
        Zip::from(&mut water)
            .and(occurrence)
            .and(cloud)
            .and(&snow)
            .for_each(|w, &o, &c, &s| *w |= o > threshold && !c && !s);
    }

    SnowWater {
        snow,
        water,
        occurrence_threshold,
    }
}

/// Occurrence level typical of the water already seen spectrally, so that
/// only places at least as reliably wet are forced to water.
fn derived_threshold(occurrence: &Array2<f64>, spectral_water: &Array2<bool>) -> f64 {
    match percentile(&mut masked_values(occurrence, spectral_water), OCCURRENCE_PERCENTILE) {
        Some(p) => (p - OCCURRENCE_MARGIN).min(OCCURRENCE_CAP),
        None => OCCURRENCE_CAP,
    }
}
