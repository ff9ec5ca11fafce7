//! Run configuration for the classifier
//!
//! [`ClassifyConfig`] is built once (usually from `Default` or JSON), checked
//! with [`ClassifyConfig::validate`], and passed by reference to `classify`,
//! which validates it again before any stage runs.

use cloudmask_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::morphology::StructuringElement;

/// Output classes, in ascending priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Class {
    Clear,
    Water,
    Snow,
    Shadow,
    Cloud,
    NoData,
}

impl Class {
    pub const ALL: [Class; 6] = [
        Class::Clear,
        Class::Water,
        Class::Snow,
        Class::Shadow,
        Class::Cloud,
        Class::NoData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Class::Clear => "clear",
            Class::Water => "water",
            Class::Snow => "snow",
            Class::Shadow => "shadow",
            Class::Cloud => "cloud",
            Class::NoData => "nodata",
        }
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Dilation radius per class, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DilationRadii {
    pub cloud: i32,
    pub shadow: i32,
    pub snow: i32,
}

impl Default for DilationRadii {
    fn default() -> Self {
        Self {
            cloud: 3,
            shadow: 3,
            snow: 0,
        }
    }
}

impl DilationRadii {
    /// All radii zero: assembly performs no dilation
    pub fn none() -> Self {
        Self {
            cloud: 0,
            shadow: 0,
            snow: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, radius) in [
            ("dilation.cloud", self.cloud),
            ("dilation.shadow", self.shadow),
            ("dilation.snow", self.snow),
        ] {
            if radius < 0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: radius.to_string(),
                    reason: "dilation radius must be non-negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Structuring element shape used for per-class dilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DilationShape {
    #[default]
    Square,
    Disk,
}

impl DilationShape {
    pub fn element(self, radius: usize) -> StructuringElement {
        match self {
            DilationShape::Square => StructuringElement::Square(radius),
            DilationShape::Disk => StructuringElement::Disk(radius),
        }
    }
}

/// Numeric code written to the class mask for each class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassCodes {
    pub clear: u8,
    pub water: u8,
    pub shadow: u8,
    pub snow: u8,
    pub cloud: u8,
    pub nodata: u8,
}

impl Default for ClassCodes {
    fn default() -> Self {
        Self {
            clear: 0,
            water: 1,
            shadow: 2,
            snow: 3,
            cloud: 4,
            nodata: 255,
        }
    }
}

impl ClassCodes {
    pub fn code(&self, class: Class) -> u8 {
        match class {
            Class::Clear => self.clear,
            Class::Water => self.water,
            Class::Snow => self.snow,
            Class::Shadow => self.shadow,
            Class::Cloud => self.cloud,
            Class::NoData => self.nodata,
        }
    }

    /// Class carrying `code`, if any
    pub fn decode(&self, code: u8) -> Option<Class> {
        Class::ALL.into_iter().find(|&c| self.code(c) == code)
    }

    /// Reject configurations where two classes share a code
    pub fn validate(&self) -> Result<()> {
        for (i, &first) in Class::ALL.iter().enumerate() {
            for &second in &Class::ALL[i + 1..] {
                if self.code(first) == self.code(second) {
                    return Err(Error::DuplicateClassCode {
                        code: self.code(first),
                        first: first.name(),
                        second: second.name(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Cloud shadow search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowParams {
    /// Lowest cloud height searched, metres
    pub min_cloud_height: f64,
    /// Highest cloud height searched, metres
    pub max_cloud_height: f64,
    /// Height increment in metres; `None` steps one pixel of shadow displacement
    pub height_step: Option<f64>,
    /// Minimum silhouette overlap for a match to be accepted
    pub min_similarity: f64,
}

impl Default for ShadowParams {
    fn default() -> Self {
        Self {
            min_cloud_height: 200.0,
            max_cloud_height: 12_000.0,
            height_step: None,
            min_similarity: 0.3,
        }
    }
}

/// Complete configuration of one classification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub dilation: DilationRadii,
    pub dilation_shape: DilationShape,
    /// No-data sentinel of the elevation layer; the raster's own when `None`
    pub elevation_nodata: Option<f64>,
    /// No-data sentinel of the water occurrence layer; the raster's own when `None`
    pub water_occurrence_nodata: Option<f64>,
    pub codes: ClassCodes,
    /// Margin added to the clear-sky P82.5 probability to form the dynamic threshold
    pub cloud_probability_threshold: f64,
    /// Weight of the thin-cirrus probability term
    pub cirrus_weight: f64,
    /// Clear-sky pixel count at or below which the scene is treated as fully cloudy
    pub min_clear_pixels: usize,
    pub shadow: ShadowParams,
    /// Occurrence percentage above which pixels are forced to water; derived from the scene when `None`
    pub water_occurrence_threshold: Option<f64>,
    /// Whether the elevation layer is used at all
    pub use_elevation: bool,
    /// Whether `classify` returns the cloud probability layer
    pub emit_probability: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            dilation: DilationRadii::default(),
            dilation_shape: DilationShape::default(),
            elevation_nodata: Some(-9999.0),
            water_occurrence_nodata: Some(255.0),
            codes: ClassCodes::default(),
            cloud_probability_threshold: 0.175,
            cirrus_weight: 0.3,
            min_clear_pixels: 40_000,
            shadow: ShadowParams::default(),
            water_occurrence_threshold: None,
            use_elevation: true,
            emit_probability: false,
        }
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ClassifyConfig {
    /// Check every option; the first problem found is returned.
    pub fn validate(&self) -> Result<()> {
        self.dilation.validate()?;
        self.codes.validate()?;

        if !self.cloud_probability_threshold.is_finite() {
            return Err(invalid(
                "cloud_probability_threshold",
                self.cloud_probability_threshold,
                "must be finite",
            ));
        }
        if !(self.cirrus_weight.is_finite() && self.cirrus_weight >= 0.0) {
            return Err(invalid("cirrus_weight", self.cirrus_weight, "must be non-negative"));
        }

        let s = &self.shadow;
        if !(s.min_cloud_height.is_finite() && s.min_cloud_height >= 0.0) {
            return Err(invalid(
                "shadow.min_cloud_height",
                s.min_cloud_height,
                "must be non-negative",
            ));
        }
        if !(s.max_cloud_height.is_finite() && s.max_cloud_height >= s.min_cloud_height) {
            return Err(invalid(
                "shadow.max_cloud_height",
                s.max_cloud_height,
                "must be at least shadow.min_cloud_height",
            ));
        }
        if let Some(step) = s.height_step
            && !(step.is_finite() && step > 0.0)
        {
            return Err(invalid("shadow.height_step", step, "must be positive"));
        }
        if !(0.0..=1.0).contains(&s.min_similarity) {
            return Err(invalid("shadow.min_similarity", s.min_similarity, "must be within [0, 1]"));
        }

        if let Some(t) = self.water_occurrence_threshold
            && !(0.0..=100.0).contains(&t)
        {
            return Err(invalid("water_occurrence_threshold", t, "must be a percentage"));
        }

        Ok(())
    }

    /// Structuring element for dilating `class`, or `None` if it is not dilated
    pub(crate) fn dilation_element(&self, class: Class) -> Option<StructuringElement> {
        let radius = match class {
            Class::Cloud => self.dilation.cloud,
            Class::Shadow => self.dilation.shadow,
            Class::Snow => self.dilation.snow,
            _ => 0,
        };
        (radius > 0).then(|| self.dilation_shape.element(radius as usize))
    }
}
