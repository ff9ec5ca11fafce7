//! Cloud, cloud shadow, snow and water masking
//!
//! The classifier runs as a fixed sequence of stages over one scene:
//!
//! 1. spectral indices and per-pixel tests
//! 2. potential cloud layer and its clear-sky complement
//! 3. land / water cloud probability, dynamic thresholds, commission cleanup
//! 4. snow and water, with an optional surface-water-occurrence override
//! 5. cloud shadow matching along the sun direction
//! 6. priority resolution, per-class dilation and class coding
//!
//! [`classify`] is the entry point. It is a pure function of its inputs:
//! logging goes through the injected [`Telemetry`] and nothing is written to disk.

mod assemble;
mod bands;
mod classify;
mod commission;
mod config;
mod layer;
mod potential;
mod probability;
mod shadow;
mod snow_water;
mod spectral;
mod telemetry;
mod thermal;

pub use assemble::{assemble, reassemble, ClassLayers};
pub use bands::{AuxiliaryLayers, Band, SceneBands, SceneGeometry};
pub use classify::{classify, Classification, ClassificationStats, CloudMask, CloudMaskInput};
pub use config::{
    Class, ClassCodes, ClassifyConfig, DilationRadii, DilationShape, ShadowParams,
};
pub use shadow::max_shadow_displacement;
pub use telemetry::{NoopTelemetry, Stage, Telemetry, TracingTelemetry, Warning};
