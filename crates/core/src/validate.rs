//! Input validation run before any traversal
//!
//! The engine assumes every layer of a series (and the AOI mask) shares
//! one grid. These checks establish that precondition; nothing here
//! resamples or reprojects.

use crate::config::NodataMode;
use crate::error::{Error, Result};
use crate::layer::LayerInfo;

/// Pixel size tolerance, in map units
pub const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

/// Extent corner tolerance, in map units
pub const EXTENT_TOLERANCE: f64 = 1e-9;

/// Confirm all layers share CRS, pixel size, dimensions and extent.
///
/// The first layer is the reference. Layers without any CRS only match
/// other layers without one. Rotated grids are rejected.
pub fn validate_alignment(layers: &[LayerInfo]) -> Result<()> {
    let Some((base, rest)) = layers.split_first() else {
        return Err(Error::Alignment("no raster layers provided".into()));
    };

    if let Some(rotated) = layers.iter().find(|l| l.transform.is_rotated()) {
        return Err(Error::Alignment(format!(
            "Rotated geotransform: {} has rotation terms ({}, {})",
            rotated.name, rotated.transform.row_rotation, rotated.transform.col_rotation
        )));
    }

    let (base_px, base_py) = base.transform.pixel_size();
    let base_extent = base.extent();

    for layer in rest {
        match (&base.crs, &layer.crs) {
            (Some(a), Some(b)) if !a.is_equivalent(b) => {
                return Err(Error::Alignment(format!(
                    "CRS mismatch: {} is {} but {} is {}",
                    layer.name, b, base.name, a
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Alignment(format!(
                    "CRS mismatch: only one of {} and {} declares a CRS",
                    base.name, layer.name
                )));
            }
            _ => {}
        }

        let (px, py) = layer.transform.pixel_size();
        if (px - base_px).abs() > PIXEL_SIZE_TOLERANCE || (py - base_py).abs() > PIXEL_SIZE_TOLERANCE {
            return Err(Error::Alignment(format!(
                "Pixel size mismatch: {} has {}x{}, expected {}x{}",
                layer.name, px, py, base_px, base_py
            )));
        }

        if layer.width != base.width || layer.height != base.height {
            return Err(Error::Alignment(format!(
                "Raster dimensions mismatch: {} is {}x{}, expected {}x{}",
                layer.name, layer.width, layer.height, base.width, base.height
            )));
        }

        if !layer.extent().approx_eq(&base_extent, EXTENT_TOLERANCE) {
            return Err(Error::Alignment(format!("Extent mismatch: {}", layer.name)));
        }
    }

    Ok(())
}

/// Outcome of comparing the NoData sentinels of a series
#[derive(Debug, Clone, PartialEq)]
pub enum NodataCheck {
    /// A single override applies to every layer
    Override(f64),
    /// Every layer declares the same value
    Consistent(f64),
    /// Every layer lacks a NoData value
    Absent,
    /// Some layers declare no NoData value
    Missing(Vec<String>),
    /// Layers declare different values
    Inconsistent(Vec<f64>),
}

impl NodataCheck {
    /// Whether a caller should surface this as a warning
    pub fn is_warning(&self) -> bool {
        matches!(self, NodataCheck::Missing(_) | NodataCheck::Inconsistent(_))
    }
}

/// Compare the NoData sentinels the series will be analysed with.
pub fn check_nodata_consistency(layers: &[LayerInfo], mode: NodataMode) -> NodataCheck {
    if let NodataMode::Override(v) = mode {
        return NodataCheck::Override(v);
    }

    let missing: Vec<String> = layers
        .iter()
        .filter(|l| l.nodata.is_none())
        .map(|l| l.name.clone())
        .collect();
    if missing.len() == layers.len() {
        return NodataCheck::Absent;
    }
    if !missing.is_empty() {
        return NodataCheck::Missing(missing);
    }

    let mut values: Vec<f64> = Vec::new();
    for v in layers.iter().filter_map(|l| l.nodata) {
        if !values.contains(&v) {
            values.push(v);
        }
    }

    match values.as_slice() {
        [single] => NodataCheck::Consistent(*single),
        _ => NodataCheck::Inconsistent(values),
    }
}
