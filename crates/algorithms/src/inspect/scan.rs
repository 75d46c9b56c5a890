//! Value range, distinct classes and AOI coverage

use crate::change::{read_aoi_block, validity_mask};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{iter_blocks, MaskLayer, Progress, RasterProvider};
use lulc_core::raster::RasterElement;
use lulc_core::Result;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Distinct values tracked before the scan stops collecting
pub const MAX_DISTINCT_CLASSES: usize = 1024;

/// Summary of the valid values of one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScan {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Distinct integral values seen, up to [`MAX_DISTINCT_CLASSES`]
    pub distinct: BTreeSet<i64>,
    /// More distinct values exist than were collected
    pub capped: bool,
    /// The sample type is an integer type
    pub integer_type: bool,
    /// Every valid value is a whole number
    pub integral_values: bool,
    pub valid_pixels: u64,
}

impl ClassScan {
    /// "12" or ">= 1024" when capped
    pub fn distinct_label(&self) -> String {
        if self.capped {
            format!(">= {}", self.distinct.len())
        } else {
            self.distinct.len().to_string()
        }
    }
}

/// Scan the valid cells of `layer` once.
///
/// Non-integral values count toward the range but not toward the distinct set.
pub fn scan_classes<P: RasterProvider + ?Sized>(
    layer: &P,
    nodata: Option<f64>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<ClassScan> {
    let mut scan = ClassScan {
        integer_type: !<P::Cell as RasterElement>::is_float(),
        integral_values: true,
        ..ClassScan::default()
    };

    for block in iter_blocks(layer, config, progress) {
        let block = block?;
        let valid = validity_mask(block.values.view(), nodata, None)?;

        Zip::from(&block.values).and(&valid).for_each(|&v, &ok| {
            let Some(v) = v.to_f64().filter(|_| ok) else {
                return;
            };
            scan.valid_pixels += 1;
            scan.min = Some(scan.min.map_or(v, |m| m.min(v)));
            scan.max = Some(scan.max.map_or(v, |m| m.max(v)));

            if v.fract() != 0.0 {
                scan.integral_values = false;
            } else if !scan.capped {
                scan.distinct.insert(v as i64);
                if scan.distinct.len() >= MAX_DISTINCT_CLASSES {
                    scan.capped = true;
                }
            }
        });
    }

    Ok(scan)
}

/// Valid pixels of the reference layer and how many fall inside the AOI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoiCoverage {
    pub valid_pixels: u64,
    pub covered_pixels: u64,
}

impl AoiCoverage {
    /// Covered share in percent, 0.0 without valid pixels
    pub fn percent(&self) -> f64 {
        if self.valid_pixels == 0 {
            0.0
        } else {
            self.covered_pixels as f64 / self.valid_pixels as f64 * 100.0
        }
    }
}

/// Measure how much of `layer`'s valid area the AOI covers.
pub fn aoi_coverage<P: RasterProvider + ?Sized>(
    layer: &P,
    nodata: Option<f64>,
    aoi: MaskLayer<'_>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<AoiCoverage> {
    let mut coverage = AoiCoverage::default();

    for block in iter_blocks(layer, config, progress) {
        let block = block?;
        let valid = validity_mask(block.values.view(), nodata, None)?;
        let mask = read_aoi_block(Some(aoi), &block.window)?;
        let inside = validity_mask(block.values.view(), nodata, mask.as_ref().map(|m| m.view()))?;

        coverage.valid_pixels += valid.iter().filter(|&&v| v).count() as u64;
        coverage.covered_pixels += inside.iter().filter(|&&v| v).count() as u64;
    }

    Ok(coverage)
}
