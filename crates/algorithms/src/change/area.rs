//! Per-layer class histogram

use super::class_index;
use super::mask::{read_aoi_block, validity_mask};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{iter_blocks, MaskLayer, Progress, RasterProvider};
use lulc_core::Result;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel count of every class present in one layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaByClass {
    /// class id -> valid pixel count (only classes actually seen)
    pub counts: BTreeMap<usize, u64>,
}

impl AreaByClass {
    /// Total valid pixels of the layer
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, class_id: usize) -> u64 {
        self.counts.get(&class_id).copied().unwrap_or(0)
    }

    /// Tabulate the histogram for `year` with `cell_area` per pixel.
    ///
    /// Percent share is relative to the layer's valid pixels; an empty layer
    /// produces no rows.
    pub fn rows(&self, year: i32, cell_area: f64) -> Vec<AreaRow> {
        let total = self.total();
        self.counts
            .iter()
            .map(|(&class_id, &count)| AreaRow {
                year,
                class_id,
                pixel_count: count,
                area: count as f64 * cell_area.abs(),
                percent_share: percent(count, total),
            })
            .collect()
    }
}

/// One line of the area-by-class table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRow {
    pub year: i32,
    pub class_id: usize,
    pub pixel_count: u64,
    pub area: f64,
    pub percent_share: f64,
}

pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Count valid pixels per class in one traversal of `layer`.
pub fn compute_area_by_class<P: RasterProvider + ?Sized>(
    layer: &P,
    nodata: Option<f64>,
    aoi: Option<MaskLayer<'_>>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<AreaByClass> {
    config.validate()?;

    let mut histogram: Vec<u64> = Vec::new();
    for block in iter_blocks(layer, config, progress) {
        let block = block?;
        let aoi_block = read_aoi_block(aoi, &block.window)?;
        let valid = validity_mask(block.values.view(), nodata, aoi_block.as_ref().map(|a| a.view()))?;

        let mut failure = None;
        Zip::from(&block.values).and(&valid).for_each(|&v, &ok| {
            if !ok || failure.is_some() {
                return;
            }
            match class_index(v) {
                Ok(c) => {
                    if c >= histogram.len() {
                        histogram.resize(c + 1, 0);
                    }
                    histogram[c] += 1;
                }
                Err(e) => failure = Some(e),
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }

    let counts = histogram
        .into_iter()
        .enumerate()
        .filter(|&(_, n)| n > 0)
        .collect();
    Ok(AreaByClass { counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lulc_core::layer::{MemoryLayer, NoProgress};
    use lulc_core::raster::GeoTransform;
    use lulc_core::Error;

    #[test]
    fn test_counts_and_rows() {
        let layer = MemoryLayer::from_rows(
            vec![vec![1u8, 1, 2], vec![3, 255, 1]],
            GeoTransform::new(0.0, 60.0, 30.0, -30.0),
        )
        .unwrap();

        let area = compute_area_by_class(&layer, Some(255.0), None, &BlockConfig::square(2), &mut NoProgress).unwrap();
        assert_eq!(area.count(1), 3);
        assert_eq!(area.count(2), 1);
        assert_eq!(area.count(3), 1);
        assert_eq!(area.count(255), 0);
        assert_eq!(area.total(), 5);

        let rows = area.rows(2020, 900.0);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].class_id, 1);
        assert_relative_eq!(rows[0].area, 2700.0);
        assert_relative_eq!(rows[0].percent_share, 60.0);
        let share: f64 = rows.iter().map(|r| r.percent_share).sum();
        assert_relative_eq!(share, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_layer_is_not_error() {
        let layer = MemoryLayer::from_rows(vec![vec![0u8, 0]], GeoTransform::default()).unwrap();
        let area = compute_area_by_class(&layer, Some(0.0), None, &BlockConfig::default(), &mut NoProgress).unwrap();
        assert_eq!(area.total(), 0);
        assert!(area.rows(2000, 1.0).is_empty());
    }

    #[test]
    fn test_negative_class_rejected() {
        let layer = MemoryLayer::from_rows(vec![vec![1i16, -3]], GeoTransform::default()).unwrap();
        let result = compute_area_by_class(&layer, None, None, &BlockConfig::default(), &mut NoProgress);
        assert!(matches!(result, Err(Error::InvalidClassValue { .. })));
    }
}
