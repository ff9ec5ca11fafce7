//! Sun-direction projection of cloud objects

use crate::masking::bands::SceneGeometry;
use crate::masking::config::ShadowParams;
use crate::segmentation::Component;
use crate::statistics::percentile;

/// Dry adiabatic lapse rate, degrees C per km
const DRY_ADIABATIC_LAPSE_RATE: f64 = 9.8;
/// Margin around the clear-sky temperature range used when bounding cloud height, degrees C
const HEIGHT_TEMPERATURE_MARGIN: f64 = 4.0;
/// Objects with an equivalent radius of at least this many pixels use a
/// percentile of their temperatures as base temperature instead of the minimum
const BASE_TEMPERATURE_RADIUS: f64 = 8.0;
/// Percentile of terrain under a cloud taken as its ground level
const TERRAIN_PERCENTILE: f64 = 82.5;

/// Shadow displacement in pixels as `(rows, cols)` for a cloud at `height` metres.
///
/// The shadow falls away from the sun: with azimuth measured clockwise from
/// north and rows increasing southwards, a sun in the south-east casts shadows
/// to the north-west.
pub(crate) fn displacement(height: f64, geometry: &SceneGeometry) -> (isize, isize) {
    let length = height / geometry.sun_elevation.to_radians().tan() / geometry.resolution;
    let azimuth = geometry.sun_azimuth.to_radians();
    let dx = (-length * azimuth.sin()).trunc() as isize;
    let dy = (length * azimuth.cos()).trunc() as isize;
    (dy, dx)
}

/// Height increment giving one pixel of horizontal shadow displacement
pub(crate) fn one_pixel_step(geometry: &SceneGeometry) -> f64 {
    geometry.resolution * geometry.sun_elevation.to_radians().tan()
}

/// Candidate cloud heights, ascending, from `min` to `max` inclusive.
///
/// Heights are produced on demand; a tiny step at low sun yields millions.
pub(crate) fn height_steps(min: f64, max: f64, step: f64) -> impl Iterator<Item = f64> {
    let count = if min <= max && step > 0.0 {
        (((max - min) / step + 1e-9).floor() as usize).saturating_add(1)
    } else {
        0
    };
    (0..count).map(move |i| min + i as f64 * step)
}

/// Clear-sky temperature range and brightness temperature of the scene,
/// used to narrow the height search
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThermalConstraint<'a> {
    pub bt: &'a ndarray::Array2<f64>,
    pub t_low: f64,
    pub t_high: f64,
}

/// Cloud base temperature of an object: its coldest pixel, or for large
/// objects a low percentile that ignores the cold core.
pub(crate) fn base_temperature(object: &Component, bt: &ndarray::Array2<f64>) -> Option<f64> {
    let mut values: Vec<f64> = object.pixels.iter().map(|&p| bt[p]).filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    let radius = (object.area() as f64 / (2.0 * std::f64::consts::PI)).sqrt();
    if radius >= BASE_TEMPERATURE_RADIUS {
        let p = 100.0 * (radius - BASE_TEMPERATURE_RADIUS).powi(2) / radius.powi(2);
        percentile(&mut values, p)
    } else {
        values.into_iter().reduce(f64::min)
    }
}

/// Height search range of one object above its own ground level.
///
/// The configured range is narrowed with the object's base temperature: a
/// cloud cannot be lower than dry-adiabatic cooling from the coldest clear
/// surface allows, nor higher than a 1 C/km cooling from the warmest.
pub(crate) fn height_range(
    object: &Component,
    params: &ShadowParams,
    thermal: Option<ThermalConstraint<'_>>,
) -> (f64, f64) {
    let (mut low, mut high) = (params.min_cloud_height, params.max_cloud_height);
    if let Some(t) = thermal
        && let Some(base) = base_temperature(object, t.bt)
    {
        low = low.max(1000.0 * (t.t_low - HEIGHT_TEMPERATURE_MARGIN - base) / DRY_ADIABATIC_LAPSE_RATE);
        high = high.min(1000.0 * (t.t_high + HEIGHT_TEMPERATURE_MARGIN - base));
    }
    (low, high)
}

/// Terrain height of an object above the scene base, metres
pub(crate) fn terrain_offset(object: &Component, dem: &ndarray::Array2<f64>, base: f64) -> f64 {
    let mut heights: Vec<f64> = object.pixels.iter().map(|&p| dem[p]).collect();
    percentile(&mut heights, TERRAIN_PERCENTILE)
        .map(|h| h - base)
        .unwrap_or(0.0)
}

/// Largest shadow displacement in pixels the configured height range allows
/// on flat terrain, or `None` when the sun is not above the horizon.
pub fn max_shadow_displacement(geometry: &SceneGeometry, params: &ShadowParams) -> Option<f64> {
    if geometry.sun_elevation <= 0.0 {
        return None;
    }
    Some(params.max_cloud_height / geometry.sun_elevation.to_radians().tan() / geometry.resolution)
}
