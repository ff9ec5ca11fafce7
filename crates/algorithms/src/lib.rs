//! # cloudmask algorithms
//!
//! Raster algorithms and the cloud / shadow / snow / water classifier built on them.
//!
//! ## Modules
//!
//! - **morphology**: binary dilation and erosion, grey-level hole filling
//! - **segmentation**: connected-component labelling, small-object removal
//! - **statistics**: percentiles, Otsu threshold, focal variance, linear regression
//! - **imagery**: normalized difference indices
//! - **terrain**: slope
//! - **masking**: the classification pipeline and its `classify` entry point

pub(crate) mod maybe_rayon;

pub mod imagery;
pub mod masking;
pub mod morphology;
pub mod segmentation;
pub mod statistics;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::masking::{
        classify, AuxiliaryLayers, Band, ClassCodes, ClassifyConfig, Classification,
        ClassificationStats, CloudMask, CloudMaskInput, DilationRadii, DilationShape, NoopTelemetry,
        SceneBands, SceneGeometry, ShadowParams, Telemetry, TracingTelemetry, Warning,
    };
    pub use crate::morphology::{dilate_mask, erode_mask, fill_holes, StructuringElement};
    pub use crate::segmentation::{label_components, remove_small_objects, Components, Connectivity};
    pub use cloudmask_core::prelude::*;
}
