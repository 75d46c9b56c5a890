//! Global maximum class id of a layer series

use super::class_index;
use super::mask::{read_aoi_block, validity_mask};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{iter_blocks, MaskLayer, Progress, RasterProvider};
use lulc_core::{Error, Result};
use ndarray::Zip;
use tracing::debug;

/// Largest valid class id across every layer of the series.
///
/// Each layer is traversed once. Returns 0 when no valid pixel exists in any
/// layer; that is an empty result, not a failure.
///
/// # Arguments
/// * `layers` - Aligned layers of the series
/// * `nodata` - NoData sentinel of each layer, in the same order
/// * `aoi` - Optional rasterized area of interest (1 = inside)
pub fn compute_max_class<P: RasterProvider + ?Sized>(
    layers: &[&P],
    nodata: &[Option<f64>],
    aoi: Option<MaskLayer<'_>>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<usize> {
    if layers.len() != nodata.len() {
        return Err(Error::InvalidParameter {
            name: "nodata",
            value: nodata.len().to_string(),
            reason: format!("expected one NoData entry per layer ({})", layers.len()),
        });
    }
    config.validate()?;

    let mut max_class = 0usize;
    for (layer, &nd) in layers.iter().zip(nodata) {
        for block in iter_blocks(*layer, config, &mut *progress) {
            let block = block?;
            let aoi_block = read_aoi_block(aoi, &block.window)?;
            let valid = validity_mask(block.values.view(), nd, aoi_block.as_ref().map(|a| a.view()))?;

            let mut block_max: Result<usize> = Ok(max_class);
            Zip::from(&block.values).and(&valid).for_each(|&v, &ok| {
                if !ok {
                    return;
                }
                if let Ok(current) = block_max {
                    block_max = class_index(v).map(|c| current.max(c));
                }
            });
            max_class = block_max?;
        }
    }

    debug!("Max class id: {}", max_class);
    Ok(max_class)
}
