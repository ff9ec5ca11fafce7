//! Class priority resolution, per-class dilation and class coding

use cloudmask_core::raster::{GeoTransform, Raster};
use cloudmask_core::{Error, Result};
use ndarray::{Array2, Zip};

use super::config::{Class, ClassifyConfig};
use crate::morphology::dilate_mask;

/// Per-class layers of a scene before priority resolution.
///
/// Layers may overlap; [`assemble`] decides which class each pixel gets.
#[derive(Debug, Clone)]
pub struct ClassLayers {
    pub valid: Array2<bool>,
    pub cloud: Array2<bool>,
    pub shadow: Array2<bool>,
    pub snow: Array2<bool>,
    pub water: Array2<bool>,
    pub transform: GeoTransform,
}

impl ClassLayers {
    /// Empty layers (everything valid and clear) of the given shape
    pub fn clear(shape: (usize, usize)) -> Self {
        Self {
            valid: Array2::from_elem(shape, true),
            cloud: Array2::from_elem(shape, false),
            shadow: Array2::from_elem(shape, false),
            snow: Array2::from_elem(shape, false),
            water: Array2::from_elem(shape, false),
            transform: GeoTransform::default(),
        }
    }

    fn check_shapes(&self) -> Result<()> {
        let expected = self.valid.dim();
        for (name, layer) in [
            ("cloud", &self.cloud),
            ("shadow", &self.shadow),
            ("snow", &self.snow),
            ("water", &self.water),
        ] {
            if layer.dim() != expected {
                let (ar, ac) = layer.dim();
                return Err(Error::SizeMismatch {
                    layer: name.to_string(),
                    er: expected.0,
                    ec: expected.1,
                    ar,
                    ac,
                });
            }
        }
        Ok(())
    }

    /// Highest-priority class of a pixel
    fn class_at(&self, p: (usize, usize)) -> Class {
        if !self.valid[p] {
            Class::NoData
        } else if self.cloud[p] {
            Class::Cloud
        } else if self.shadow[p] {
            Class::Shadow
        } else if self.snow[p] {
            Class::Snow
        } else if self.water[p] {
            Class::Water
        } else {
            Class::Clear
        }
    }

    /// Layers with every pixel in exactly one class
    fn resolved(&self) -> Self {
        let shape = self.valid.dim();
        let mut out = Self {
            transform: self.transform,
            ..Self::clear(shape)
        };
        for ((r, c), _) in self.valid.indexed_iter() {
            let p = (r, c);
            match self.class_at(p) {
                Class::NoData => out.valid[p] = false,
                Class::Cloud => out.cloud[p] = true,
                Class::Shadow => out.shadow[p] = true,
                Class::Snow => out.snow[p] = true,
                Class::Water => out.water[p] = true,
                Class::Clear => {}
            }
        }
        out
    }
}

/// Resolve class priority, dilate cloud, shadow and snow, and encode the mask.
///
/// Priority is no-data > cloud > shadow > snow > water > clear, applied both
/// before and after dilation, so a dilated class never overwrites a higher one
/// and never spreads into no-data.
pub fn assemble(layers: &ClassLayers, config: &ClassifyConfig) -> Result<Raster<u8>> {
    config.validate()?;
    layers.check_shapes()?;

    let mut merged = layers.resolved();
    for (class, layer) in [
        (Class::Cloud, &mut merged.cloud),
        (Class::Shadow, &mut merged.shadow),
        (Class::Snow, &mut merged.snow),
    ] {
        if let Some(element) = config.dilation_element(class) {
            *layer = dilate_mask(layer, &element)?;
        }
    }

    let codes = config.codes;
    let mut data = Array2::<u8>::zeros(merged.valid.dim());
    Zip::indexed(&mut data).for_each(|p, out| *out = codes.code(merged.class_at(p)));

    let mut mask = Raster::from_array(data);
    mask.set_transform(layers.transform);
    mask.set_nodata(Some(codes.nodata));
    Ok(mask)
}

/// Decode an existing class mask with `config.codes` and assemble it again.
///
/// With all dilation radii at zero this reproduces `mask`.
pub fn reassemble(mask: &Raster<u8>, config: &ClassifyConfig) -> Result<Raster<u8>> {
    config.validate()?;
    let codes = config.codes;
    let mut layers = ClassLayers {
        transform: *mask.transform(),
        ..ClassLayers::clear(mask.shape())
    };

    for ((r, c), &code) in mask.data().indexed_iter() {
        let p = (r, c);
        let class = codes.decode(code).ok_or_else(|| {
            Error::Algorithm(format!("unknown class code {} at row {}, col {}", code, r, c))
        })?;
        match class {
            Class::NoData => layers.valid[p] = false,
            Class::Cloud => layers.cloud[p] = true,
            Class::Shadow => layers.shadow[p] = true,
            Class::Snow => layers.snow[p] = true,
            Class::Water => layers.water[p] = true,
            Class::Clear => {}
        }
    }

    assemble(&layers, config)
}
