//! Scene inputs and their normalisation
//!
//! Callers hand over loosely-typed rasters ([`SceneBands`], [`AuxiliaryLayers`]).
//! [`Scene::prepare`] checks them once and turns them into NaN-coded grids
//! plus a single validity mask, so later stages never look at sentinels.

use cloudmask_core::raster::{GeoTransform, Raster};
use cloudmask_core::{Error, Result};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::config::ClassifyConfig;
use super::telemetry::Warning;

/// Spectral band identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    /// Brightness temperature, degrees Celsius
    Thermal,
    Cirrus,
    /// Sentinel-2 B7
    RedEdge3,
    /// Sentinel-2 B8A
    NarrowNir,
}

impl Band {
    /// Bands every scene must provide
    pub const REQUIRED: [Band; 6] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Swir1 => "swir1",
            Band::Swir2 => "swir2",
            Band::Thermal => "thermal",
            Band::Cirrus => "cirrus",
            Band::RedEdge3 => "red_edge3",
            Band::NarrowNir => "narrow_nir",
        }
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Co-registered bands of one scene.
///
/// Reflective bands hold top-of-atmosphere reflectance as fractions, the
/// thermal band brightness temperature in degrees Celsius.
#[derive(Debug, Clone, Default)]
pub struct SceneBands {
    bands: BTreeMap<Band, Raster<f64>>,
    saturation: Option<Raster<u8>>,
}

impl SceneBands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`SceneBands::insert`]
    pub fn with_band(mut self, band: Band, raster: Raster<f64>) -> Self {
        self.insert(band, raster);
        self
    }

    /// Add or replace a band
    pub fn insert(&mut self, band: Band, raster: Raster<f64>) {
        self.bands.insert(band, raster);
    }

    /// Attach a visible-saturation layer (1 = saturated in any visible band)
    pub fn with_saturation(mut self, saturation: Raster<u8>) -> Self {
        self.saturation = Some(saturation);
        self
    }

    pub fn get(&self, band: Band) -> Option<&Raster<f64>> {
        self.bands.get(&band)
    }

    /// Like [`SceneBands::get`], failing with [`Error::MissingBand`]
    pub fn require(&self, band: Band) -> Result<&Raster<f64>> {
        self.get(band)
            .ok_or_else(|| Error::MissingBand(band.name().to_string()))
    }

    pub fn saturation(&self) -> Option<&Raster<u8>> {
        self.saturation.as_ref()
    }

    /// Shape of the blue band, which every other grid must match
    pub fn shape(&self) -> Result<(usize, usize)> {
        Ok(self.require(Band::Blue)?.shape())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, &Raster<f64>)> {
        self.bands.iter().map(|(&b, r)| (b, r))
    }
}

/// Sun position and pixel size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneGeometry {
    /// Degrees clockwise from north
    pub sun_azimuth: f64,
    /// Degrees above the horizon
    pub sun_elevation: f64,
    /// Metres per pixel
    pub resolution: f64,
}

impl SceneGeometry {
    pub fn new(sun_azimuth: f64, sun_elevation: f64, resolution: f64) -> Self {
        Self {
            sun_azimuth,
            sun_elevation,
            resolution,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(Error::InvalidParameter {
                name: "resolution",
                value: self.resolution.to_string(),
                reason: "must be a positive number of metres".to_string(),
            });
        }
        for (name, value) in [
            ("sun_azimuth", self.sun_azimuth),
            ("sun_elevation", self.sun_elevation),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be finite".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Optional auxiliary rasters aligned with the bands
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryLayers {
    /// Terrain elevation, metres
    pub elevation: Option<Raster<f64>>,
    /// Surface water occurrence, percent 0-100
    pub water_occurrence: Option<Raster<f64>>,
}

impl AuxiliaryLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_elevation(mut self, elevation: Raster<f64>) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_water_occurrence(mut self, occurrence: Raster<f64>) -> Self {
        self.water_occurrence = Some(occurrence);
        self
    }
}

/// Validated scene: every grid shares one shape and is NaN outside `valid`.
#[derive(Debug, Clone)]
pub(crate) struct Scene {
    pub blue: Raster<f64>,
    pub green: Raster<f64>,
    pub red: Raster<f64>,
    pub nir: Raster<f64>,
    pub swir1: Raster<f64>,
    pub swir2: Raster<f64>,
    pub thermal: Option<Raster<f64>>,
    pub cirrus: Option<Raster<f64>>,
    pub red_edge3: Option<Raster<f64>>,
    pub narrow_nir: Option<Raster<f64>>,
    pub saturated: Array2<bool>,
    pub valid: Array2<bool>,
    pub valid_count: usize,
    /// Elevation, NaN where unknown; `None` when absent or unusable
    pub elevation: Option<Array2<f64>>,
    /// Water occurrence, NaN where unknown; `None` when absent or unusable
    pub water_occurrence: Option<Array2<f64>>,
    pub geometry: SceneGeometry,
    pub transform: GeoTransform,
}

impl Scene {
    /// Check inputs and build the normalised scene.
    ///
    /// Missing required bands and misaligned bands are fatal. Auxiliary
    /// layers that cannot be used are dropped with a warning.
    pub fn prepare(
        bands: &SceneBands,
        geometry: &SceneGeometry,
        aux: &AuxiliaryLayers,
        config: &ClassifyConfig,
        warnings: &mut Vec<Warning>,
    ) -> Result<Self> {
        geometry.validate()?;

        for band in Band::REQUIRED {
            bands.require(band)?;
        }
        let shape = bands.shape()?;
        if shape.0 == 0 || shape.1 == 0 {
            return Err(Error::InvalidDimensions {
                width: shape.1,
                height: shape.0,
            });
        }
        for (band, raster) in bands.iter() {
            raster.ensure_shape(shape, band.name())?;
        }
        if let Some(sat) = bands.saturation() {
            sat.ensure_shape(shape, "saturation")?;
        }

        let mut valid = Array2::from_elem(shape, true);
        for (_, raster) in bands.iter() {
            Zip::from(&mut valid).and(raster.data()).for_each(|ok, &v| {
                if raster.is_nodata(v) {
                    *ok = false;
                }
            });
        }
        let valid_count = valid.iter().filter(|&&v| v).count();

        let normalise = |band: Band| -> Option<Raster<f64>> {
            bands.get(band).map(|raster| {
                let mut data = raster.to_f64_array();
                Zip::from(&mut data).and(&valid).for_each(|v, &ok| {
                    if !ok {
                        *v = f64::NAN;
                    }
                });
                let mut out = Raster::from_array(data);
                out.set_transform(*raster.transform());
                out.set_nodata(Some(f64::NAN));
                out
            })
        };
        let required = |band: Band| normalise(band).ok_or_else(|| Error::MissingBand(band.name().to_string()));

        let saturated = match bands.saturation() {
            Some(sat) => {
                let nodata = sat.nodata();
                let mut flags = sat.data().mapv(|v| v == 1 && nodata != Some(1));
                Zip::from(&mut flags).and(&valid).for_each(|s, &ok| *s &= ok);
                flags
            }
            None => Array2::from_elem(shape, false),
        };

        let elevation = if config.use_elevation {
            auxiliary_grid(
                "elevation",
                aux.elevation.as_ref(),
                config.elevation_nodata,
                shape,
                &valid,
                warnings,
            )
        } else {
            None
        };
        let water_occurrence = auxiliary_grid(
            "water_occurrence",
            aux.water_occurrence.as_ref(),
            config.water_occurrence_nodata,
            shape,
            &valid,
            warnings,
        );

        let blue = required(Band::Blue)?;
        let transform = *blue.transform();

        Ok(Self {
            green: required(Band::Green)?,
            red: required(Band::Red)?,
            nir: required(Band::Nir)?,
            swir1: required(Band::Swir1)?,
            swir2: required(Band::Swir2)?,
            blue,
            thermal: normalise(Band::Thermal),
            cirrus: normalise(Band::Cirrus),
            red_edge3: normalise(Band::RedEdge3),
            narrow_nir: normalise(Band::NarrowNir),
            saturated,
            valid,
            valid_count,
            elevation,
            water_occurrence,
            geometry: *geometry,
            transform,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.valid.dim()
    }

    pub fn has_thermal(&self) -> bool {
        self.thermal.is_some()
    }

    /// Both bands needed for the cloud displacement index are present
    pub fn has_cdi_bands(&self) -> bool {
        self.red_edge3.is_some() && self.narrow_nir.is_some()
    }
}

fn auxiliary_grid(
    layer: &'static str,
    raster: Option<&Raster<f64>>,
    nodata_override: Option<f64>,
    shape: (usize, usize),
    valid: &Array2<bool>,
    warnings: &mut Vec<Warning>,
) -> Option<Array2<f64>> {
    let Some(raster) = raster else {
        warnings.push(Warning::DegradedAuxiliary {
            layer,
            reason: "not supplied".to_string(),
        });
        return None;
    };

    if raster.shape() != shape {
        let (rows, cols) = raster.shape();
        warnings.push(Warning::DegradedAuxiliary {
            layer,
            reason: format!(
                "size {}x{} does not match scene {}x{}",
                rows, cols, shape.0, shape.1
            ),
        });
        return None;
    }

    let mut grid = match nodata_override {
        Some(nd) => raster
            .data()
            .mapv(|v| if v.is_nan() || v == nd { f64::NAN } else { v }),
        None => raster.to_f64_array(),
    };
    Zip::from(&mut grid).and(valid).for_each(|v, &ok| {
        if !ok {
            *v = f64::NAN;
        }
    });

    if !grid.iter().any(|v| v.is_finite()) {
        warnings.push(Warning::DegradedAuxiliary {
            layer,
            reason: "no valid pixels inside the scene".to_string(),
        });
        return None;
    }

    Some(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value)
    }

    fn scene_bands(rows: usize, cols: usize) -> SceneBands {
        Band::REQUIRED
            .iter()
            .fold(SceneBands::new(), |acc, &b| acc.with_band(b, flat(rows, cols, 0.1)))
    }

    fn geometry() -> SceneGeometry {
        SceneGeometry::new(135.0, 45.0, 30.0)
    }

    #[test]
    fn test_missing_required_band_is_fatal() {
        let mut bands = SceneBands::new();
        for b in &Band::REQUIRED[..5] {
            bands.insert(*b, flat(3, 3, 0.1));
        }
        let mut warnings = Vec::new();
        let err = Scene::prepare(&bands, &geometry(), &AuxiliaryLayers::new(), &ClassifyConfig::default(), &mut warnings)
            .unwrap_err();
        assert!(matches!(err, Error::MissingBand(ref b) if b == "swir2"));
        assert!(err.is_fatal_input());
    }

    #[test]
    fn test_misaligned_optional_band_is_fatal() {
        let bands = scene_bands(3, 3).with_band(Band::Thermal, flat(3, 4, 20.0));
        let mut warnings = Vec::new();
        let err = Scene::prepare(&bands, &geometry(), &AuxiliaryLayers::new(), &ClassifyConfig::default(), &mut warnings)
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { ref layer, .. } if layer == "thermal"));
    }

    #[test]
    fn test_nodata_in_any_band_invalidates_pixel() {
        let mut nir = flat(2, 2, 0.3);
        nir.set_nodata(Some(-1.0));
        nir.set(0, 1, -1.0).unwrap();
        let mut thermal = flat(2, 2, 15.0);
        thermal.set(1, 0, f64::NAN).unwrap();

        let bands = scene_bands(2, 2)
            .with_band(Band::Nir, nir)
            .with_band(Band::Thermal, thermal);
        let mut warnings = Vec::new();
        let scene = Scene::prepare(&bands, &geometry(), &AuxiliaryLayers::new(), &ClassifyConfig::default(), &mut warnings)
            .unwrap();

        assert_eq!(scene.valid_count, 2);
        assert!(!scene.valid[(0, 1)] && !scene.valid[(1, 0)]);
        assert!(scene.blue.get(0, 1).unwrap().is_nan());
        assert!((scene.nir.get(0, 0).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_absent_elevation_warns_only_when_requested() {
        let bands = scene_bands(2, 2);
        let mut warnings = Vec::new();
        Scene::prepare(&bands, &geometry(), &AuxiliaryLayers::new(), &ClassifyConfig::default(), &mut warnings)
            .unwrap();
        assert!(warnings.iter().any(|w| matches!(w, Warning::DegradedAuxiliary { layer: "elevation", .. })));

        let config = ClassifyConfig {
            use_elevation: false,
            ..ClassifyConfig::default()
        };
        let mut warnings = Vec::new();
        Scene::prepare(&bands, &geometry(), &AuxiliaryLayers::new(), &config, &mut warnings).unwrap();
        assert!(!warnings.iter().any(|w| matches!(w, Warning::DegradedAuxiliary { layer: "elevation", .. })));
    }

    #[test]
    fn test_auxiliary_override_sentinel() {
        let mut dem = flat(2, 2, 500.0);
        dem.set(0, 0, -9999.0).unwrap();
        let aux = AuxiliaryLayers::new().with_elevation(dem);
        let mut warnings = Vec::new();
        let scene = Scene::prepare(&scene_bands(2, 2), &geometry(), &aux, &ClassifyConfig::default(), &mut warnings)
            .unwrap();
        let elevation = scene.elevation.unwrap();
        assert!(elevation[(0, 0)].is_nan());
        assert_eq!(elevation[(1, 1)], 500.0);
    }

    #[test]
    fn test_misaligned_or_empty_auxiliary_is_dropped() {
        let aux = AuxiliaryLayers::new()
            .with_elevation(flat(3, 3, 100.0))
            .with_water_occurrence(flat(2, 2, 255.0));
        let mut warnings = Vec::new();
        let scene = Scene::prepare(&scene_bands(2, 2), &geometry(), &aux, &ClassifyConfig::default(), &mut warnings)
            .unwrap();
        assert!(scene.elevation.is_none());
        assert!(scene.water_occurrence.is_none());
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_bad_resolution_rejected() {
        let mut warnings = Vec::new();
        let err = Scene::prepare(
            &scene_bands(2, 2),
            &SceneGeometry::new(90.0, 30.0, 0.0),
            &AuxiliaryLayers::new(),
            &ClassifyConfig::default(),
            &mut warnings,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
