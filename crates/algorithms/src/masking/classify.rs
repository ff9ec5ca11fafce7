//! The `classify` entry point

use cloudmask_core::raster::Raster;
use cloudmask_core::{Algorithm, Error, Result};
use ndarray::Array2;
use serde::Serialize;
use std::time::Instant;

use super::assemble::{assemble, ClassLayers};
use super::bands::{AuxiliaryLayers, Scene, SceneBands, SceneGeometry};
use super::commission::{remove_commission, CommissionInputs};
use super::config::{Class, ClassifyConfig};
use super::layer::{and, count, to_raster};
use super::potential::potential_layers;
use super::probability::cloud_probability;
use super::shadow::{cloud_shadows, ThermalConstraint};
use super::snow_water::{snow_and_water, snow_test};
use super::spectral::spectral_layers;
use super::telemetry::{Stage, Telemetry, TracingTelemetry, Warning};
use super::thermal::{normalize_temperature, TemperatureBounds};

/// Cloud cover (share of valid pixels) at which shadow matching is skipped
const HIGH_CLOUD_COVER: f64 = 0.9;

/// Result of one classification run
#[derive(Debug, Clone)]
pub struct Classification {
    /// Class codes per pixel
    pub mask: Raster<u8>,
    /// Cloud probability in [0, 1], NaN outside the valid area; only when requested
    pub probability: Option<Raster<f64>>,
    pub warnings: Vec<Warning>,
    pub stats: ClassificationStats,
}

/// Summary numbers of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationStats {
    pub rows: usize,
    pub cols: usize,
    pub valid_pixels: usize,
    /// Valid pixels that failed the potential cloud tests
    pub clear_sky_pixels: usize,
    pub potential_cloud_pixels: usize,
    pub cloud_pixels: usize,
    pub shadow_pixels: usize,
    pub snow_pixels: usize,
    pub water_pixels: usize,
    pub clear_pixels: usize,
    pub nodata_pixels: usize,
    pub cloud_objects: usize,
    pub matched_shadows: usize,
    pub land_threshold: Option<f64>,
    pub water_threshold: Option<f64>,
    /// Fitted temperature lapse rate, degrees C per metre, when applied
    pub lapse_rate: Option<f64>,
    pub water_occurrence_threshold: Option<f64>,
}

impl ClassificationStats {
    /// Share of valid pixels labelled cloud in the final mask
    pub fn cloud_fraction(&self) -> f64 {
        if self.valid_pixels == 0 {
            0.0
        } else {
            self.cloud_pixels as f64 / self.valid_pixels as f64
        }
    }

    fn count_classes(&mut self, mask: &Raster<u8>, config: &ClassifyConfig) {
        let codes = config.codes;
        for &code in mask.data() {
            match codes.decode(code) {
                Some(Class::Cloud) => self.cloud_pixels += 1,
                Some(Class::Shadow) => self.shadow_pixels += 1,
                Some(Class::Snow) => self.snow_pixels += 1,
                Some(Class::Water) => self.water_pixels += 1,
                Some(Class::Clear) => self.clear_pixels += 1,
                Some(Class::NoData) | None => self.nodata_pixels += 1,
            }
        }
    }
}

/// Warnings of a run, forwarded to telemetry as they arise
struct Reporter<'a> {
    telemetry: &'a dyn Telemetry,
    warnings: Vec<Warning>,
}

impl Reporter<'_> {
    fn warn(&mut self, warning: Warning) {
        self.telemetry.warning(&warning);
        self.warnings.push(warning);
    }

    fn stage<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.telemetry.stage_started(stage);
        let start = Instant::now();
        let out = f()?;
        self.telemetry.stage_finished(stage, start.elapsed());
        Ok(out)
    }
}

/// Classify every pixel of a scene.
///
/// Fails on configuration errors and on missing or misaligned bands; every
/// other problem degrades the result and is reported as a [`Warning`].
pub fn classify(
    bands: &SceneBands,
    geometry: &SceneGeometry,
    aux: &AuxiliaryLayers,
    config: &ClassifyConfig,
    telemetry: &dyn Telemetry,
) -> Result<Classification> {
    config.validate()?;

    let mut report = Reporter {
        telemetry,
        warnings: Vec::new(),
    };

    let mut prepare_warnings = Vec::new();
    let scene = report.stage(Stage::Prepare, || {
        Scene::prepare(bands, geometry, aux, config, &mut prepare_warnings)
    })?;
    for w in prepare_warnings {
        report.warn(w);
    }

    let (rows, cols) = scene.shape();
    telemetry.detail(
        Stage::Prepare,
        &format!(
            "{} x {}, {} valid pixels, thermal: {}, cdi bands: {}",
            cols,
            rows,
            scene.valid_count,
            scene.has_thermal(),
            scene.has_cdi_bands()
        ),
    );
    let mut stats = ClassificationStats {
        rows,
        cols,
        valid_pixels: scene.valid_count,
        ..ClassificationStats::default()
    };

    let (spectral, snow_candidates) = report.stage(Stage::Spectral, || {
        let spectral = spectral_layers(&scene)?;
        let snow = snow_test(&scene, &spectral)?;
        Ok((spectral, snow))
    })?;

    let potential = report.stage(Stage::PotentialCloud, || Ok(potential_layers(&scene, &spectral)))?;
    stats.clear_sky_pixels = potential.clear_count();
    stats.potential_cloud_pixels = count(&potential.potential);

    let calibrated = stats.clear_sky_pixels > config.min_clear_pixels;
    let mut thermal: Option<(Array2<f64>, TemperatureBounds)> = None;
    let mut probability = None;

    let cloud = if calibrated {
        let reference = potential.reference(scene.valid_count);

        let bt = scene.thermal.as_ref().map(|band| match &scene.elevation {
            Some(dem) => {
                let normalized = normalize_temperature(band.data(), dem, reference);
                if let Some(fit) = normalized.fit {
                    telemetry.detail(
                        Stage::Probability,
                        &format!(
                            "lapse rate {:.5} C/m (t = {:.2}, n = {}), applied: {}",
                            fit.slope, fit.t_statistic, fit.n, normalized.applied
                        ),
                    );
                    if normalized.applied {
                        stats.lapse_rate = Some(fit.slope);
                    }
                }
                normalized.bt
            }
            None => band.data().clone(),
        });
        let bounds = bt
            .as_ref()
            .and_then(|bt| TemperatureBounds::from_reference(bt, reference));

        let layers = report.stage(Stage::Probability, || {
            cloud_probability(&scene, &spectral, &potential, bt.as_ref(), bounds, config)
        })?;
        telemetry.detail(
            Stage::Probability,
            &format!(
                "land threshold {:.4}, water threshold {:.4}",
                layers.land_threshold, layers.water_threshold
            ),
        );
        stats.land_threshold = Some(layers.land_threshold);
        stats.water_threshold = Some(layers.water_threshold);
        if config.emit_probability {
            probability = Some(layers.published(&spectral.water));
        }

        let cloud = report.stage(Stage::Commission, || {
            let inputs = CommissionInputs {
                scene: &scene,
                spectral: &spectral,
                bt: bt.as_ref(),
                snow: &snow_candidates,
            };
            remove_commission(&layers.cloud, &inputs)
        })?;

        if let (Some(bt), Some(bounds)) = (bt, bounds) {
            thermal = Some((bt, bounds));
        }
        cloud
    } else {
        report.warn(Warning::TooFewClearPixels {
            clear: stats.clear_sky_pixels,
            required: config.min_clear_pixels,
        });
        if config.emit_probability {
            probability = Some(scene.valid.mapv(|ok| if ok { 1.0 } else { f64::NAN }));
        }
        potential.potential.clone()
    };
    let cloud = and(&cloud, &scene.valid);

    let surface = report.stage(Stage::SnowWater, || {
        Ok(snow_and_water(&scene, &spectral, &snow_candidates, &cloud, config))
    })?;
    stats.water_occurrence_threshold = surface.occurrence_threshold;

    let cloud_fraction = if scene.valid_count == 0 {
        0.0
    } else {
        count(&cloud) as f64 / scene.valid_count as f64
    };

    let shadow = if geometry.sun_elevation <= 0.0 {
        report.warn(Warning::Geometry {
            sun_elevation: geometry.sun_elevation,
        });
        None
    } else if !calibrated {
        None
    } else if cloud_fraction >= HIGH_CLOUD_COVER {
        report.warn(Warning::HighCloudCover { cloud_fraction });
        None
    } else {
        let constraint = thermal.as_ref().map(|(bt, b)| ThermalConstraint {
            bt,
            t_low: b.t_low,
            t_high: b.t_high,
        });
        let layers = report.stage(Stage::Shadow, || {
            cloud_shadows(
                &scene,
                &cloud,
                &surface.water,
                &potential.clear_land,
                constraint,
                &config.shadow,
            )
        })?;
        for m in &layers.matches {
            telemetry.detail(
                Stage::Shadow,
                &format!(
                    "cloud {} matched at {:.0} m, offset {:?}, similarity {:.3}",
                    m.label, m.height, m.offset, m.similarity
                ),
            );
        }
        telemetry.detail(
            Stage::Shadow,
            &format!(
                "{} of {} cloud objects matched, {} candidate shadow pixels",
                layers.matches.len(),
                layers.cloud_objects,
                layers.candidate_pixels
            ),
        );
        stats.cloud_objects = layers.cloud_objects;
        stats.matched_shadows = layers.matches.len();
        Some(layers.shadow)
    };

    let mask = report.stage(Stage::Assemble, || {
        let layers = ClassLayers {
            valid: scene.valid.clone(),
            cloud: cloud.clone(),
            shadow: shadow.unwrap_or_else(|| Array2::from_elem((rows, cols), false)),
            snow: surface.snow.clone(),
            water: surface.water.clone(),
            transform: scene.transform,
        };
        assemble(&layers, config)
    })?;
    stats.count_classes(&mask, config);

    Ok(Classification {
        mask,
        probability: probability.map(|p| to_raster(p, scene.transform)),
        warnings: report.warnings,
        stats,
    })
}

/// Inputs of [`CloudMask`]
#[derive(Debug, Clone)]
pub struct CloudMaskInput {
    pub bands: SceneBands,
    pub geometry: SceneGeometry,
    pub aux: AuxiliaryLayers,
}

/// [`classify`] as an [`Algorithm`], reporting through `tracing`
#[derive(Debug, Clone, Default)]
pub struct CloudMask;

impl Algorithm for CloudMask {
    type Input = CloudMaskInput;
    type Output = Classification;
    type Params = ClassifyConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CloudMask"
    }

    fn description(&self) -> &'static str {
        "Classify pixels as clear, water, snow, cloud shadow, cloud or no-data"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        classify(&input.bands, &input.geometry, &input.aux, &params, &TracingTelemetry)
    }
}
