//! Cloud-to-shadow matching
//!
//! Each cloud object's silhouette is slid along the shadow direction through
//! the candidate heights. The height at which the silhouette best overlaps the
//! potential shadow layer is the object's height, and the silhouette placed
//! there is its shadow.

use ndarray::Array2;

use super::projection::{
    displacement, height_range, height_steps, one_pixel_step, terrain_offset, ThermalConstraint,
};
use crate::masking::bands::SceneGeometry;
use crate::masking::config::ShadowParams;
use crate::maybe_rayon::*;
use crate::segmentation::{Component, Components};

/// Everything the matcher reads
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatchInputs<'a> {
    pub clouds: &'a Components,
    /// Potential shadow layer
    pub candidates: &'a Array2<bool>,
    pub water: &'a Array2<bool>,
    pub geometry: SceneGeometry,
    pub params: ShadowParams,
    pub thermal: Option<ThermalConstraint<'a>>,
    /// Elevation grid and the scene base elevation
    pub terrain: Option<(&'a Array2<f64>, f64)>,
}

/// Accepted match of one cloud object
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShadowMatch {
    pub label: u32,
    pub height: f64,
    pub similarity: f64,
    /// Shadow displacement as (rows, cols)
    pub offset: (isize, isize),
}

/// Overlap of an object's silhouette, shifted by `offset`, with the shadow candidates.
///
/// Projected pixels that fall back on the object itself are ignored;
/// projected pixels outside the scene count as misses. Returns `None` when
/// nothing overlaps, or when every overlapped candidate is water.
pub(crate) fn similarity(object: &Component, offset: (isize, isize), inputs: &MatchInputs<'_>) -> Option<f64> {
    let (rows, cols) = inputs.candidates.dim();
    let (dy, dx) = offset;
    let (mut total, mut hits, mut dry_hits) = (0usize, 0usize, 0usize);

    for &(r, c) in &object.pixels {
        let nr = r as isize + dy;
        let nc = c as isize + dx;
        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
            total += 1;
            continue;
        }
        let p = (nr as usize, nc as usize);
        if inputs.clouds.labels[p] == object.label {
            continue;
        }
        total += 1;
        if inputs.candidates[p] {
            hits += 1;
            if !inputs.water[p] {
                dry_hits += 1;
            }
        }
    }

    if hits == 0 || dry_hits == 0 || total == 0 {
        return None;
    }
    Some(hits as f64 / total as f64)
}

/// Best height for one object, if any reaches the similarity threshold.
///
/// Ties keep the lowest height.
pub(crate) fn match_object(object: &Component, inputs: &MatchInputs<'_>) -> Option<ShadowMatch> {
    let (low, high) = height_range(object, &inputs.params, inputs.thermal);
    let offset = inputs
        .terrain
        .map(|(dem, base)| terrain_offset(object, dem, base))
        .unwrap_or(0.0);
    let step = inputs
        .params
        .height_step
        .unwrap_or_else(|| one_pixel_step(&inputs.geometry));

    // Beyond the scene diagonal every projected pixel falls outside the scene.
    let (rows, cols) = inputs.candidates.dim();
    let reach = (rows * rows + cols * cols) as f64;

    let mut best: Option<ShadowMatch> = None;
    let mut previous = None;
    for height in height_steps(low + offset, high + offset, step) {
        let shift = displacement(height, &inputs.geometry);
        if (shift.0 as f64).powi(2) + (shift.1 as f64).powi(2) > reach {
            break;
        }
        // Neighbouring heights often round to the same shift.
        if previous == Some(shift) {
            continue;
        }
        previous = Some(shift);

        let Some(score) = similarity(object, shift, inputs) else {
            continue;
        };
        if best.is_none_or(|b| score > b.similarity) {
            best = Some(ShadowMatch {
                label: object.label,
                height,
                similarity: score,
                offset: shift,
            });
        }
    }

    best.filter(|m| m.similarity >= inputs.params.min_similarity)
}

/// Match every cloud object and paint the shadows of the matched ones.
///
/// Objects are matched in parallel; footprints are combined in label order.
pub(crate) fn match_shadows(inputs: &MatchInputs<'_>) -> (Array2<bool>, Vec<ShadowMatch>) {
    let (rows, cols) = inputs.candidates.dim();

    let results: Vec<Option<ShadowMatch>> = inputs
        .clouds
        .objects
        .par_iter()
        .map(|object| match_object(object, inputs))
        .collect();

    let mut shadow = Array2::from_elem((rows, cols), false);
    let mut matches = Vec::new();
    for (object, result) in inputs.clouds.objects.iter().zip(results) {
        let Some(m) = result else {
            continue;
        };
        let (dy, dx) = m.offset;
        for &(r, c) in &object.pixels {
            let nr = r as isize + dy;
            let nc = c as isize + dx;
            if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                shadow[(nr as usize, nc as usize)] = true;
            }
        }
        matches.push(m);
    }

    (shadow, matches)
}
