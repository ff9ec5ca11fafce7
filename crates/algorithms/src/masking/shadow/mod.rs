//! Cloud shadow detection
//!
//! - **candidates**: potential shadow pixels from NIR / SWIR1 fill depth
//! - **projection**: sun geometry, height ranges and displacements
//! - **matcher**: per-object search for the best-overlapping height

mod candidates;
mod matcher;
mod projection;

pub use projection::max_shadow_displacement;

pub(crate) use matcher::ShadowMatch;
pub(crate) use projection::ThermalConstraint;

use cloudmask_core::Result;
use ndarray::Array2;

use super::bands::Scene;
use super::config::ShadowParams;
use super::layer::count;
use crate::segmentation::{label_components, Connectivity};
use crate::statistics::masked_percentile;
use candidates::potential_shadow;
use matcher::{match_shadows, MatchInputs};

/// Percentile of scene elevation taken as the terrain base
const BASE_ELEVATION_PERCENTILE: f64 = 0.001;

/// Result of the shadow stage
#[derive(Debug, Clone)]
pub(crate) struct ShadowLayers {
    /// Matched shadow footprints
    pub shadow: Array2<bool>,
    pub cloud_objects: usize,
    /// Accepted matches in label order
    pub matches: Vec<ShadowMatch>,
    pub candidate_pixels: usize,
}

/// Find cloud shadows for the given cloud layer.
pub(crate) fn cloud_shadows(
    scene: &Scene,
    cloud: &Array2<bool>,
    water: &Array2<bool>,
    clear_land: &Array2<bool>,
    thermal: Option<ThermalConstraint<'_>>,
    params: &ShadowParams,
) -> Result<ShadowLayers> {
    let candidates = potential_shadow(scene, water, clear_land)?;
    let clouds = label_components(cloud, Connectivity::Eight);

    let terrain = scene.elevation.as_ref().and_then(|dem| {
        masked_percentile(dem, &scene.valid, BASE_ELEVATION_PERCENTILE).map(|base| (dem, base))
    });

    let inputs = MatchInputs {
        clouds: &clouds,
        candidates: &candidates,
        water,
        geometry: scene.geometry,
        params: *params,
        thermal,
        terrain,
    };
    let (shadow, matches) = match_shadows(&inputs);

    Ok(ShadowLayers {
        shadow,
        cloud_objects: clouds.len(),
        matches,
        candidate_pixels: count(&candidates),
    })
}
