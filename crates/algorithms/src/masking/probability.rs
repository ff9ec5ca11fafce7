//! Land and water cloud probability
//!
//! Both probabilities are calibrated on the clear-sky pixels of the scene
//! itself: a pixel is cloud when its probability exceeds what the clear sky
//! reaches at its 82.5th percentile by more than a fixed margin.

use ndarray::{Array2, Zip};

use super::bands::Scene;
use super::config::ClassifyConfig;
use super::layer::{count, par_cells};
use super::potential::PotentialLayers;
use super::spectral::SpectralLayers;
use super::thermal::{TemperatureBounds, HIGH_PERCENTILE, LOW_PERCENTILE};
use crate::statistics::{masked_values, percentile};
use cloudmask_core::Result;

/// Margin around the clear-sky HOT range
const HOT_MARGIN: f64 = 0.04;
/// Cirrus reflectance giving a thin-cirrus term of 1
const CIRRUS_SCALE: f64 = 0.04;
/// Degrees C below clear water at which the water temperature term reaches 1
const WATER_TEMPERATURE_SCALE: f64 = 4.0;
/// Clear water pixels needed before the water temperature term is used
const MIN_CLEAR_WATER: usize = 100;
/// SWIR1 reflectance at which the water brightness term saturates
const WATER_BRIGHTNESS_SCALE: f64 = 0.11;
/// Degrees C below `t_low` at which any pixel is cloud
const EXTREMELY_COLD: f64 = 35.0;

#[derive(Debug, Clone)]
pub(crate) struct ProbabilityLayers {
    pub land: Array2<f64>,
    pub water: Array2<f64>,
    pub land_threshold: f64,
    pub water_threshold: f64,
    /// Final cloud layer before commission cleanup
    pub cloud: Array2<bool>,
}

impl ProbabilityLayers {
    /// Probability of the branch that applies to each pixel, clipped to [0, 1]
    pub fn published(&self, water: &Array2<bool>) -> Array2<f64> {
        Zip::from(&self.land)
            .and(&self.water)
            .and(water)
            .map_collect(|&l, &w, &is_water| {
                let p = if is_water { w } else { l };
                if p.is_nan() { p } else { p.clamp(0.0, 1.0) }
            })
    }
}

/// Compute both probabilities, their thresholds and the cloud layer.
///
/// `bt` is the (possibly lapse-rate normalised) brightness temperature and
/// `bounds` its clear-sky range; both are `None` without a thermal band.
pub(crate) fn cloud_probability(
    scene: &Scene,
    spectral: &SpectralLayers,
    potential: &PotentialLayers,
    bt: Option<&Array2<f64>>,
    bounds: Option<TemperatureBounds>,
    config: &ClassifyConfig,
) -> Result<ProbabilityLayers> {
    let reference = potential.reference(scene.valid_count);
    let shape = scene.shape();

    let cirrus = |r: usize, c: usize| -> f64 {
        potential
            .cirrus
            .as_ref()
            .map(|ci| (ci[(r, c)] / CIRRUS_SCALE).max(0.0))
            .unwrap_or(0.0)
    };

    // Brightness stands in for temperature when there is no thermal band.
    let hot_range = if bt.is_none() {
        let mut hot = masked_values(&spectral.hot, reference);
        let lo = percentile(&mut hot, LOW_PERCENTILE).unwrap_or(0.0) - HOT_MARGIN;
        let hi = percentile(&mut hot, HIGH_PERCENTILE).unwrap_or(0.0) + HOT_MARGIN;
        Some((lo, hi))
    } else {
        None
    };

    let land = par_cells(shape, |r, c| {
        if !scene.valid[(r, c)] {
            return f64::NAN;
        }

        let saturated = scene.saturated[(r, c)];
        let mut ndsi = spectral.ndsi[(r, c)];
        let mut ndvi = spectral.ndvi[(r, c)];
        if saturated && ndsi < 0.0 {
            ndsi = 0.0;
        }
        if saturated && ndvi > 0.0 {
            ndvi = 0.0;
        }
        let variability = 1.0
            - ndsi
                .abs()
                .max(ndvi.abs())
                .max(spectral.ndbi[(r, c)].abs())
                .max(spectral.whiteness[(r, c)]);

        let temperature = match (bt, bounds) {
            (Some(bt), Some(b)) => ((b.t_high - bt[(r, c)]) / (b.t_high - b.t_low)).max(0.0),
            _ => 1.0,
        };
        let brightness = match hot_range {
            Some((lo, hi)) => ((spectral.hot[(r, c)] - lo) / (hi - lo)).clamp(0.0, 1.0),
            None => 1.0,
        };

        temperature * variability * brightness + config.cirrus_weight * cirrus(r, c)
    })?;

    let water_bt = match bt {
        Some(bt) if count(&potential.clear_water) > MIN_CLEAR_WATER => {
            percentile(&mut masked_values(bt, &potential.clear_water), HIGH_PERCENTILE)
        }
        _ => None,
    };

    let water = par_cells(shape, |r, c| {
        if !scene.valid[(r, c)] {
            return f64::NAN;
        }
        let temperature = match (bt, water_bt) {
            (Some(bt), Some(t_water)) => ((t_water - bt[(r, c)]) / WATER_TEMPERATURE_SCALE).max(0.0),
            _ => 1.0,
        };
        let swir1 = unsafe { scene.swir1.get_unchecked(r, c) };
        let brightness = (swir1 / WATER_BRIGHTNESS_SCALE).clamp(0.0, 1.0);
        temperature * brightness + config.cirrus_weight * cirrus(r, c)
    })?;

    let margin = config.cloud_probability_threshold;
    let land_threshold =
        percentile(&mut masked_values(&land, &potential.clear_land), HIGH_PERCENTILE).unwrap_or(0.0) + margin;
    let water_threshold =
        percentile(&mut masked_values(&water, &potential.clear_water), HIGH_PERCENTILE).unwrap_or(0.0)
            + margin;

    let cold_limit = bounds.map(|b| b.t_low - EXTREMELY_COLD);
    let cloud = par_cells(shape, |r, c| {
        if !scene.valid[(r, c)] {
            return false;
        }
        let is_water = spectral.water[(r, c)];
        let cold = match (bt, cold_limit) {
            (Some(bt), Some(limit)) => bt[(r, c)] < limit,
            _ => false,
        };
        potential.potential[(r, c)]
            || (!is_water && land[(r, c)] > land_threshold)
            || (is_water && water[(r, c)] > water_threshold)
            || cold
    })?;

    Ok(ProbabilityLayers {
        land,
        water,
        land_threshold,
        water_threshold,
        cloud,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masking::bands::{AuxiliaryLayers, Band, SceneBands, SceneGeometry};
    use crate::masking::potential::potential_layers;
    use crate::masking::spectral::spectral_layers;
    use cloudmask_core::Raster;

    /// 10x10 vegetated scene with a bright 2x2 patch in the corner
    fn scene(thermal: bool) -> Scene {
        let values = [0.03, 0.06, 0.04, 0.3, 0.15, 0.07];
        let mut bands = SceneBands::new();
        for (&band, v) in Band::REQUIRED.iter().zip(values) {
            let mut raster = Raster::filled(10, 10, v);
            for r in 0..2 {
                for c in 0..2 {
                    raster.set(r, c, if band == Band::Nir { 0.42 } else { 0.4 }).unwrap();
                }
            }
            bands.insert(band, raster);
        }
        if thermal {
            let mut bt = Raster::filled(10, 10, 20.0);
            for r in 0..2 {
                for c in 0..2 {
                    bt.set(r, c, -5.0).unwrap();
                }
            }
            bands.insert(Band::Thermal, bt);
        }
        let mut warnings = Vec::new();
        Scene::prepare(
            &bands,
            &SceneGeometry::new(135.0, 45.0, 30.0),
            &AuxiliaryLayers::new(),
            &ClassifyConfig::default(),
            &mut warnings,
        )
        .unwrap()
    }

    fn run(thermal: bool) -> (ProbabilityLayers, SpectralLayers) {
        let scene = scene(thermal);
        let spectral = spectral_layers(&scene).unwrap();
        let potential = potential_layers(&scene, &spectral);
        let reference = potential.reference(scene.valid_count).clone();
        let bt = scene.thermal.as_ref().map(|t| t.data().clone());
        let bounds = bt
            .as_ref()
            .and_then(|bt| TemperatureBounds::from_reference(bt, &reference));
        let layers = cloud_probability(
            &scene,
            &spectral,
            &potential,
            bt.as_ref(),
            bounds,
            &ClassifyConfig::default(),
        )
        .unwrap();
        (layers, spectral)
    }

    #[test]
    fn test_bright_patch_is_cloud_with_thermal() {
        let (layers, _) = run(true);
        assert!(layers.cloud[(0, 0)]);
        assert!(!layers.cloud[(5, 5)]);
        assert!(layers.land[(0, 0)] > layers.land[(5, 5)]);
    }

    #[test]
    fn test_bright_patch_is_cloud_without_thermal() {
        let (layers, _) = run(false);
        assert!(layers.cloud[(1, 1)]);
        assert!(!layers.cloud[(9, 9)]);
    }

    #[test]
    fn test_published_probability_is_clipped() {
        let (layers, spectral) = run(true);
        let p = layers.published(&spectral.water);
        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_land_threshold_without_clear_land_is_the_margin() {
        // open water everywhere except a bright patch; nothing is clear land
        let water = [0.05, 0.04, 0.03, 0.02, 0.01, 0.005];
        let mut bands = SceneBands::new();
        for (&band, v) in Band::REQUIRED.iter().zip(water) {
            let mut raster = Raster::filled(10, 10, v);
            for r in 0..2 {
                for c in 0..2 {
                    raster.set(r, c, if band == Band::Nir { 0.42 } else { 0.4 }).unwrap();
                }
            }
            bands.insert(band, raster);
        }
        let config = ClassifyConfig::default();
        let scene = Scene::prepare(
            &bands,
            &SceneGeometry::new(135.0, 45.0, 30.0),
            &AuxiliaryLayers::new(),
            &config,
            &mut Vec::new(),
        )
        .unwrap();
        let spectral = spectral_layers(&scene).unwrap();
        let potential = potential_layers(&scene, &spectral);
        assert_eq!(count(&potential.clear_land), 0);
        assert_eq!(count(&potential.clear), 96);

        let layers = cloud_probability(&scene, &spectral, &potential, None, None, &config).unwrap();
        assert_eq!(layers.land_threshold, config.cloud_probability_threshold);
    }
}
