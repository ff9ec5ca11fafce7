//! Otsu threshold on a 1-D sample
//!
//! Histogram-based: the sample range is split into equal-width bins and the
//! returned threshold is the center of the bin that maximizes the
//! between-class variance.

/// Default number of histogram bins
pub const OTSU_BINS: usize = 256;

/// Otsu threshold of the finite values in `values`.
///
/// Returns `None` for an empty sample; a constant sample returns its value.
pub fn otsu_threshold(values: &[f64], bins: usize) -> Option<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.clone().fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    if bins < 2 || max <= min {
        return Some(min);
    }

    let width = (max - min) / bins as f64;
    let mut hist = vec![0.0f64; bins];
    for v in finite {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        hist[idx] += 1.0;
    }
    let centers: Vec<f64> = (0..bins).map(|i| min + (i as f64 + 0.5) * width).collect();

    // class weights and means below (1) and above (2) each cut
    let mut weight1 = vec![0.0; bins];
    let mut mean1 = vec![0.0; bins];
    let (mut w, mut s) = (0.0, 0.0);
    for i in 0..bins {
        w += hist[i];
        s += hist[i] * centers[i];
        weight1[i] = w;
        mean1[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut weight2 = vec![0.0; bins];
    let mut mean2 = vec![0.0; bins];
    let (mut w, mut s) = (0.0, 0.0);
    for i in (0..bins).rev() {
        w += hist[i];
        s += hist[i] * centers[i];
        weight2[i] = w;
        mean2[i] = if w > 0.0 { s / w } else { 0.0 };
    }

    let mut best = 0;
    let mut best_var = f64::NEG_INFINITY;
    for i in 0..bins - 1 {
        let diff = mean1[i] - mean2[i + 1];
        let var = weight1[i] * weight2[i + 1] * diff * diff;
        if var > best_var {
            best_var = var;
            best = i;
        }
    }

    Some(centers[best])
}
