//! End-to-end classification of synthetic scenes.
//!
//! Every scene is 120x120 pixels at 30 m over vegetated land. Reflectances
//! are fractions, brightness temperature is degrees C.

use cloudmask_algorithms::masking::{
    classify, max_shadow_displacement, reassemble, AuxiliaryLayers, Band, Class, ClassCodes,
    ClassifyConfig, DilationRadii, NoopTelemetry, SceneBands, SceneGeometry, ShadowParams,
    Stage, Telemetry, Warning,
};
use approx::assert_relative_eq;
use cloudmask_core::raster::Raster;
use std::sync::Mutex;

const SIZE: usize = 120;

/// blue, green, red, nir, swir1, swir2
const LAND: [f64; 6] = [0.04, 0.07, 0.05, 0.30, 0.18, 0.09];
const CLOUD: [f64; 6] = [0.40, 0.42, 0.41, 0.45, 0.38, 0.28];
const SHADOW: [f64; 6] = [0.03, 0.05, 0.04, 0.08, 0.05, 0.03];

/// Cloud block and the shadow it casts at 860 m with the sun at 135 / 45 degrees
const CLOUD_ROWS: std::ops::Range<usize> = 70..90;
const SHADOW_ROWS: std::ops::Range<usize> = 50..70;

fn geometry() -> SceneGeometry {
    SceneGeometry::new(135.0, 45.0, 30.0)
}

fn config() -> ClassifyConfig {
    ClassifyConfig {
        min_clear_pixels: 1_000,
        use_elevation: false,
        ..ClassifyConfig::default()
    }
}

fn in_block(r: usize, c: usize, block: &std::ops::Range<usize>) -> bool {
    block.contains(&r) && block.contains(&c)
}

/// Land scene with a square cloud and, optionally, its shadow
fn cloudy_scene(with_shadow: bool) -> SceneBands {
    let mut bands = SceneBands::new();
    for (i, &band) in Band::REQUIRED.iter().enumerate() {
        let mut raster = Raster::filled(SIZE, SIZE, LAND[i]);
        for r in 0..SIZE {
            for c in 0..SIZE {
                if in_block(r, c, &CLOUD_ROWS) {
                    raster.set(r, c, CLOUD[i]).unwrap();
                } else if with_shadow && in_block(r, c, &SHADOW_ROWS) {
                    raster.set(r, c, SHADOW[i]).unwrap();
                }
            }
        }
        bands.insert(band, raster);
    }
    bands
}

fn with_thermal(bands: SceneBands) -> SceneBands {
    let mut bt = Raster::filled(SIZE, SIZE, 20.0);
    for r in CLOUD_ROWS {
        for c in CLOUD_ROWS {
            bt.set(r, c, -20.0).unwrap();
        }
    }
    bands.with_band(Band::Thermal, bt)
}

fn class_at(mask: &Raster<u8>, r: usize, c: usize) -> Option<Class> {
    ClassCodes::default().decode(mask.get(r, c).unwrap())
}

/// Records warnings and stage order
#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<Stage>>,
    warnings: Mutex<Vec<String>>,
}

impl Telemetry for Recorder {
    fn stage_finished(&self, stage: Stage, _elapsed: std::time::Duration) {
        self.stages.lock().unwrap().push(stage);
    }

    fn warning(&self, warning: &Warning) {
        self.warnings.lock().unwrap().push(warning.to_string());
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn bright_cloud_and_its_shadow() {
    let result = classify(
        &cloudy_scene(true),
        &geometry(),
        &AuxiliaryLayers::new(),
        &config(),
        &NoopTelemetry,
    )
    .unwrap();
    let mask = &result.mask;

    assert_eq!(class_at(mask, 80, 80), Some(Class::Cloud));
    assert_eq!(class_at(mask, 60, 60), Some(Class::Shadow));
    assert_eq!(class_at(mask, 10, 100), Some(Class::Clear));
    assert_eq!(class_at(mask, 110, 20), Some(Class::Clear));

    // cloud dilated by 3 px on every side
    assert_eq!(class_at(mask, 67, 80), Some(Class::Cloud));
    assert_eq!(class_at(mask, 66, 70), Some(Class::Shadow));
    assert_eq!(class_at(mask, 80, 93), Some(Class::Clear));

    assert_eq!(result.stats.cloud_objects, 1);
    assert_eq!(result.stats.matched_shadows, 1);
    assert_eq!(result.stats.cloud_pixels, 26 * 26);
    // clear land: variability 2/7, brightness 0.5
    assert_relative_eq!(result.stats.land_threshold.unwrap(), 1.0 / 7.0 + 0.175, epsilon = 1e-9);
    assert!(
        result
            .warnings
            .iter()
            .all(|w| matches!(w, Warning::DegradedAuxiliary { .. })),
        "{:?}",
        result.warnings
    );
}

#[test]
fn cold_cloud_with_thermal_band() {
    let bands = with_thermal(cloudy_scene(false));
    let result = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config(), &NoopTelemetry).unwrap();

    for (r, c) in [(70, 70), (80, 80), (89, 89)] {
        assert_eq!(class_at(&result.mask, r, c), Some(Class::Cloud));
    }
    assert_eq!(class_at(&result.mask, 20, 20), Some(Class::Clear));
    assert_eq!(result.stats.cloud_pixels, 26 * 26);
}

#[test]
fn water_occurrence_forces_water() {
    let bands = cloudy_scene(false);
    let mut occurrence = Raster::filled(SIZE, SIZE, 0.0);
    for r in 0..20 {
        for c in 0..40 {
            occurrence.set(r, c, if c < 20 { 95.0 } else { 60.0 }).unwrap();
        }
    }
    let aux = AuxiliaryLayers::new().with_water_occurrence(occurrence);

    // no spectral water: the derived threshold is the 90 cap
    let derived = classify(&bands, &geometry(), &aux, &config(), &NoopTelemetry).unwrap();
    assert_eq!(class_at(&derived.mask, 5, 5), Some(Class::Water));
    assert_eq!(class_at(&derived.mask, 5, 30), Some(Class::Clear));
    assert_eq!(derived.stats.water_occurrence_threshold, Some(90.0));
    assert_eq!(derived.stats.water_pixels, 400);

    let fixed = ClassifyConfig {
        water_occurrence_threshold: Some(50.0),
        ..config()
    };
    let forced = classify(&bands, &geometry(), &aux, &fixed, &NoopTelemetry).unwrap();
    assert_eq!(class_at(&forced.mask, 5, 30), Some(Class::Water));
    assert_eq!(forced.stats.water_pixels, 800);
    // cloud wins over the override
    assert_eq!(class_at(&forced.mask, 80, 80), Some(Class::Cloud));
}

#[test]
fn sun_below_horizon_skips_shadows() {
    let recorder = Recorder::default();
    let result = classify(
        &cloudy_scene(true),
        &SceneGeometry::new(135.0, 0.0, 30.0),
        &AuxiliaryLayers::new(),
        &config(),
        &recorder,
    )
    .unwrap();

    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::Geometry { sun_elevation } if *sun_elevation == 0.0)));
    assert_eq!(result.stats.shadow_pixels, 0);
    assert_eq!(class_at(&result.mask, 80, 80), Some(Class::Cloud));

    let stages = recorder.stages.lock().unwrap();
    assert!(!stages.contains(&Stage::Shadow));
    assert_eq!(stages.last(), Some(&Stage::Assemble));
    assert_eq!(recorder.warnings.lock().unwrap().len(), result.warnings.len());
}

#[test]
fn missing_band_is_fatal() {
    let mut bands = SceneBands::new();
    for (i, &band) in Band::REQUIRED.iter().enumerate().take(5) {
        bands.insert(band, Raster::filled(4, 4, LAND[i]));
    }
    let err = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config(), &NoopTelemetry).unwrap_err();
    assert!(err.is_fatal_input());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn nodata_propagates_to_mask() {
    let mut bands = cloudy_scene(true);
    let mut blue = bands.get(Band::Blue).unwrap().clone();
    blue.set_nodata(Some(-9999.0));
    for r in 0..SIZE {
        blue.set(r, 0, -9999.0).unwrap();
    }
    blue.set(80, 80, -9999.0).unwrap();
    bands.insert(Band::Blue, blue);

    let result = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config(), &NoopTelemetry).unwrap();
    for r in 0..SIZE {
        assert_eq!(result.mask.get(r, 0).unwrap(), 255);
    }
    assert_eq!(result.mask.get(80, 80).unwrap(), 255);
    assert_eq!(result.mask.get(80, 81).unwrap(), ClassCodes::default().cloud);
    assert_eq!(result.stats.nodata_pixels, SIZE + 1);
    assert_eq!(result.stats.valid_pixels, SIZE * SIZE - SIZE - 1);
}

#[test]
fn classification_is_deterministic() {
    let bands = with_thermal(cloudy_scene(true));
    let config = ClassifyConfig {
        emit_probability: true,
        ..config()
    };
    let a = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &NoopTelemetry).unwrap();
    let b = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &NoopTelemetry).unwrap();
    assert_eq!(a.mask.data(), b.mask.data());
    assert_eq!(a.stats, b.stats);

    let pa = a.probability.unwrap();
    let pb = b.probability.unwrap();
    for (x, y) in pa.data().iter().zip(pb.data()) {
        assert_eq!(x.to_bits(), y.to_bits());
        assert!(x.is_nan() || (0.0..=1.0).contains(x));
    }
}

#[test]
fn reassembling_with_zero_radii_is_idempotent() {
    let result = classify(
        &cloudy_scene(true),
        &geometry(),
        &AuxiliaryLayers::new(),
        &config(),
        &NoopTelemetry,
    )
    .unwrap();
    let zero = ClassifyConfig {
        dilation: DilationRadii::none(),
        ..config()
    };
    let again = reassemble(&result.mask, &zero).unwrap();
    assert_eq!(again.data(), result.mask.data());
}

#[test]
fn larger_cloud_radius_never_shrinks_cloud() {
    let bands = cloudy_scene(true);
    let mut previous = 0;
    for radius in [0, 1, 3, 6] {
        let config = ClassifyConfig {
            dilation: DilationRadii {
                cloud: radius,
                ..DilationRadii::default()
            },
            ..config()
        };
        let result = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &NoopTelemetry).unwrap();
        assert!(result.stats.cloud_pixels >= previous);
        previous = result.stats.cloud_pixels;
    }
    assert_eq!(previous, 32 * 32);
}

#[test]
fn shadow_stays_within_geometric_reach() {
    let params = ShadowParams::default();
    let reach = max_shadow_displacement(&geometry(), &params).unwrap();
    let config = ClassifyConfig {
        dilation: DilationRadii::none(),
        ..config()
    };
    let result = classify(
        &cloudy_scene(true),
        &geometry(),
        &AuxiliaryLayers::new(),
        &config,
        &NoopTelemetry,
    )
    .unwrap();

    let shadow = ClassCodes::default().shadow;
    let (cr, cc) = (79.5, 79.5);
    let mut seen = 0;
    for ((r, c), &code) in result.mask.data().indexed_iter() {
        if code == shadow {
            seen += 1;
            let d = ((r as f64 - cr).powi(2) + (c as f64 - cc).powi(2)).sqrt();
            assert!(d <= reach + 20.0);
            // north-west of the cloud
            assert!(r < 70 && c < 70);
        }
    }
    assert_eq!(seen, 400);
}

#[test]
fn custom_codes_relabel_only() {
    let bands = cloudy_scene(true);
    let default = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config(), &NoopTelemetry).unwrap();

    let codes = ClassCodes {
        clear: 1,
        water: 2,
        shadow: 3,
        snow: 4,
        cloud: 5,
        nodata: 0,
    };
    let custom_config = ClassifyConfig { codes, ..config() };
    let custom = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &custom_config, &NoopTelemetry).unwrap();

    assert_eq!(custom.mask.nodata(), Some(0));
    for (&a, &b) in default.mask.data().iter().zip(custom.mask.data()) {
        let class = ClassCodes::default().decode(a).unwrap();
        assert_eq!(codes.code(class), b);
    }
    assert_eq!(default.stats, custom.stats);
}

#[test]
fn duplicate_codes_rejected() {
    let mut config = config();
    config.codes.snow = config.codes.cloud;
    let err = classify(
        &cloudy_scene(false),
        &geometry(),
        &AuxiliaryLayers::new(),
        &config,
        &NoopTelemetry,
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

/// Land scene with pixels painted by `paint`
fn painted_scene(paint: impl Fn(usize, usize) -> Option<[f64; 6]>) -> SceneBands {
    let mut bands = SceneBands::new();
    for (i, &band) in Band::REQUIRED.iter().enumerate() {
        let mut raster = Raster::filled(SIZE, SIZE, LAND[i]);
        for r in 0..SIZE {
            for c in 0..SIZE {
                if let Some(values) = paint(r, c) {
                    raster.set(r, c, values[i]).unwrap();
                }
            }
        }
        bands.insert(band, raster);
    }
    bands
}

#[test]
fn small_clouds_survive_commission_filter() {
    // bright cloud whose NDBI matches the vegetation, so no edge reads as built-up
    const SMALL_CLOUD: [f64; 6] = [0.40, 0.42, 0.41, 0.56, 0.34, 0.20];
    let config = ClassifyConfig {
        dilation: DilationRadii::none(),
        ..config()
    };

    for k in [4, 5, 6] {
        let bands = painted_scene(|r, c| {
            ((60..60 + k).contains(&r) && (60..60 + k).contains(&c)).then_some(SMALL_CLOUD)
        });
        let result = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &NoopTelemetry).unwrap();
        assert_eq!(result.stats.cloud_pixels, k * k, "{0}x{0} cloud", k);
        assert_eq!(class_at(&result.mask, 60, 60), Some(Class::Cloud));
    }
}

#[test]
fn overcast_scene_skips_shadow_matching() {
    let recorder = Recorder::default();
    // 115x115 cloud on a 120x120 scene: 91.8 % of valid pixels
    let bands = painted_scene(|r, c| (r < 115 && c < 115).then_some(CLOUD));
    let config = ClassifyConfig {
        min_clear_pixels: 100,
        ..config()
    };
    let result = classify(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &recorder).unwrap();

    let cover = result.warnings.iter().find_map(|w| match w {
        Warning::HighCloudCover { cloud_fraction } => Some(*cloud_fraction),
        _ => None,
    });
    assert_relative_eq!(cover.unwrap(), (115.0 * 115.0) / (120.0 * 120.0), epsilon = 1e-9);
    assert!(!result.warnings.iter().any(|w| matches!(w, Warning::TooFewClearPixels { .. })));
    assert_eq!(result.stats.shadow_pixels, 0);
    assert_eq!(result.stats.matched_shadows, 0);
    assert!(!recorder.stages.lock().unwrap().contains(&Stage::Shadow));
}

#[test]
fn unusable_water_occurrence_is_ignored() {
    let bands = cloudy_scene(false);

    let misaligned = AuxiliaryLayers::new().with_water_occurrence(Raster::filled(60, 60, 100.0));
    let result = classify(&bands, &geometry(), &misaligned, &config(), &NoopTelemetry).unwrap();
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        Warning::DegradedAuxiliary { layer: "water_occurrence", reason } if reason.contains("does not match")
    )));
    assert_eq!(result.stats.water_pixels, 0);
    assert_eq!(result.stats.water_occurrence_threshold, None);

    // every pixel carries the no-data value
    let empty = AuxiliaryLayers::new().with_water_occurrence(Raster::filled(SIZE, SIZE, 255.0));
    let result = classify(&bands, &geometry(), &empty, &config(), &NoopTelemetry).unwrap();
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        Warning::DegradedAuxiliary { layer: "water_occurrence", reason } if reason.contains("no valid pixels")
    )));
    assert_eq!(result.stats.water_pixels, 0);
    assert_eq!(result.stats.water_occurrence_threshold, None);
}
