//! Potential cloud layer and its clear-sky complement

use ndarray::{Array2, Zip};
use std::collections::BTreeMap;

use super::bands::Scene;
use super::layer::{and, and_not, count};
use super::spectral::SpectralLayers;
use crate::statistics::{masked_values, percentile};

/// Percentile of clear-sky cirrus treated as the cirrus background
const CIRRUS_BACKGROUND_PERCENTILE: f64 = 2.0;
/// Elevation stratum height used when removing the cirrus background, metres
const CIRRUS_STRATUM: f64 = 100.0;
/// Normalised cirrus reflectance above which a pixel is potential cloud
const CIRRUS_MIN: f64 = 0.01;
/// Clear land must reach this share of valid pixels to serve as the reference
const CLEAR_LAND_MIN_FRACTION: f64 = 0.001;

#[derive(Debug, Clone)]
pub(crate) struct PotentialLayers {
    pub potential: Array2<bool>,
    /// Valid and not potential cloud
    pub clear: Array2<bool>,
    pub clear_land: Array2<bool>,
    pub clear_water: Array2<bool>,
    /// Cirrus reflectance above its clear-sky background, clipped at 0
    pub cirrus: Option<Array2<f64>>,
}

impl PotentialLayers {
    pub fn clear_count(&self) -> usize {
        count(&self.clear)
    }

    /// Pixels that calibrate the temperature and brightness ranges: clear
    /// land, or all clear pixels when clear land is too scarce.
    pub fn reference(&self, valid_count: usize) -> &Array2<bool> {
        let land = count(&self.clear_land) as f64;
        if land >= CLEAR_LAND_MIN_FRACTION * valid_count as f64 && land > 0.0 {
            &self.clear_land
        } else {
            &self.clear
        }
    }
}

/// Combine the per-pixel tests into the potential cloud layer.
pub(crate) fn potential_layers(scene: &Scene, spectral: &SpectralLayers) -> PotentialLayers {
    let mut potential = Zip::from(&spectral.basic)
        .and(&spectral.whiteness_test)
        .and(&spectral.haze)
        .and(&spectral.ratio)
        .map_collect(|&b, &w, &h, &r| b && w && h && r);

    let cirrus = scene.cirrus.as_ref().map(|band| {
        let clear = and_not(&scene.valid, &potential);
        normalize_cirrus(band.data(), &clear, scene.elevation.as_ref())
    });

    if let Some(cirrus) = &cirrus {
        Zip::from(&mut potential)
            .and(cirrus)
            .for_each(|p, &c| *p |= c > CIRRUS_MIN);
    }

    let clear = and_not(&scene.valid, &potential);
    let clear_land = and_not(&clear, &spectral.water);
    let clear_water = and(&clear, &spectral.water);

    PotentialLayers {
        potential,
        clear,
        clear_land,
        clear_water,
        cirrus,
    }
}

/// Subtract the clear-sky cirrus background.
///
/// With an elevation grid the background is estimated per elevation stratum,
/// since the cirrus band still sees the surface at high altitude. Strata
/// without clear pixels fall back to the scene-wide background.
fn normalize_cirrus(
    cirrus: &Array2<f64>,
    clear: &Array2<bool>,
    elevation: Option<&Array2<f64>>,
) -> Array2<f64> {
    let global = percentile(&mut masked_values(cirrus, clear), CIRRUS_BACKGROUND_PERCENTILE).unwrap_or(0.0);

    let strata = elevation.and_then(|dem| {
        let base = dem.iter().copied().filter(|v| v.is_finite()).reduce(f64::min)?;
        let stratum_of = |z: f64| ((z - base) / CIRRUS_STRATUM).floor() as i64;

        let mut samples: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        Zip::from(cirrus).and(clear).and(dem).for_each(|&c, &ok, &z| {
            if ok && c.is_finite() && z.is_finite() {
                samples.entry(stratum_of(z)).or_default().push(c);
            }
        });
        let backgrounds: BTreeMap<i64, f64> = samples
            .into_iter()
            .filter_map(|(k, mut v)| percentile(&mut v, CIRRUS_BACKGROUND_PERCENTILE).map(|p| (k, p)))
            .collect();

        Some(Zip::from(dem).map_collect(|&z| {
            if z.is_finite() {
                backgrounds.get(&stratum_of(z)).copied().unwrap_or(global)
            } else {
                global
            }
        }))
    });

    match strata {
        Some(background) => Zip::from(cirrus)
            .and(&background)
            .map_collect(|&c, &bg| if c.is_nan() { f64::NAN } else { (c - bg).max(0.0) }),
        None => cirrus.mapv(|c| if c.is_nan() { f64::NAN } else { (c - global).max(0.0) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cirrus_background_removed() {
        let cirrus = array![[0.002, 0.002, 0.002], [0.002, 0.002, 0.05]];
        let clear = array![[true, true, true], [true, true, false]];
        let normalized = normalize_cirrus(&cirrus, &clear, None);
        assert!(normalized[(0, 0)].abs() < 1e-12);
        assert!((normalized[(1, 2)] - 0.048).abs() < 1e-12);
    }

    #[test]
    fn test_cirrus_background_per_stratum() {
        let cirrus = array![[0.001, 0.001, 0.009, 0.009, 0.03]];
        let clear = array![[true, true, true, true, false]];
        let dem = array![[0.0, 50.0, 2000.0, 2050.0, 2020.0]];
        let normalized = normalize_cirrus(&cirrus, &clear, Some(&dem));
        // high pixels are judged against the high-ground background
        assert!(normalized[(0, 2)].abs() < 1e-12);
        assert!((normalized[(0, 4)] - 0.021).abs() < 1e-12);
    }

    #[test]
    fn test_reference_falls_back_to_all_clear() {
        let layers = PotentialLayers {
            potential: Array2::from_elem((1, 2), false),
            clear: array![[true, true]],
            clear_land: array![[false, false]],
            clear_water: array![[true, true]],
            cirrus: None,
        };
        assert_eq!(layers.reference(2), &layers.clear);
        assert_eq!(layers.clear_count(), 2);
    }
}
