//! Percentiles over masked samples
//!
//! Uses linear interpolation between closest ranks, so P50 of an even-sized
//! sample is the mean of the two middle values.

use ndarray::{Array2, Zip};

/// Percentile `p` (0-100) of an ascending slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile `p` (0-100) of the finite values in `values`.
///
/// Reorders `values` in place.
pub fn percentile(values: &mut Vec<f64>, p: f64) -> Option<f64> {
    values.retain(|v| v.is_finite());
    values.sort_unstable_by(f64::total_cmp);
    percentile_sorted(values, p)
}

/// Finite values of `data` where `mask` is set, in raster order
pub fn masked_values(data: &Array2<f64>, mask: &Array2<bool>) -> Vec<f64> {
    let mut out = Vec::new();
    Zip::from(data).and(mask).for_each(|&v, &m| {
        if m && v.is_finite() {
            out.push(v);
        }
    });
    out
}

/// Percentile `p` (0-100) of `data` over the cells selected by `mask`.
///
/// Returns `None` when no finite value is selected.
pub fn masked_percentile(data: &Array2<f64>, mask: &Array2<bool>, p: f64) -> Option<f64> {
    let mut values = masked_values(data, mask);
    percentile(&mut values, p)
}
