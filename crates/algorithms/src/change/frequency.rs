//! Per-pixel change frequency across a layer series

use super::mask::{conjunct, read_aoi_block, validity_mask};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{iter_blocks, read_window, BlockWriter, MaskLayer, Progress, RasterProvider};
use lulc_core::{Error, Result};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output value of a pixel invalid at any step of the series
pub const FREQUENCY_NODATA: i16 = -1;

/// Cell histogram of a written change-frequency raster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencySummary {
    /// number of changes -> pixel count
    pub histogram: BTreeMap<i16, u64>,
    /// Pixels written as [`FREQUENCY_NODATA`]
    pub nodata_cells: u64,
}

impl FrequencySummary {
    /// Pixels with a valid tally
    pub fn valid_cells(&self) -> u64 {
        self.histogram.values().sum()
    }

    /// Pixels that changed at least once
    pub fn changed_cells(&self) -> u64 {
        self.histogram.range(1..).map(|(_, n)| n).sum()
    }
}

/// Count, per pixel, how many consecutive steps of `layers` change class.
///
/// Each block position walks the whole stack once. A pixel invalid in any
/// layer (or outside the AOI) is written as [`FREQUENCY_NODATA`]; validity
/// only narrows along the stack. Blocks go to `writer` as soon as they are
/// finished.
///
/// # Arguments
/// * `layers` - At least two aligned layers, ordered by time
/// * `nodata` - NoData sentinel of each layer
/// * `aoi` - Optional rasterized area of interest
/// * `writer` - Sink for the `i16` output blocks
pub fn write_change_frequency<P: RasterProvider + ?Sized>(
    layers: &[&P],
    nodata: &[Option<f64>],
    aoi: Option<MaskLayer<'_>>,
    writer: &mut dyn BlockWriter<i16>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<FrequencySummary> {
    let (first, rest) = match layers {
        [first, rest @ ..] if !rest.is_empty() => (*first, rest),
        _ => {
            return Err(Error::InvalidParameter {
                name: "layers",
                value: layers.len().to_string(),
                reason: "change frequency needs at least two layers".into(),
            })
        }
    };
    if layers.len() != nodata.len() {
        return Err(Error::InvalidParameter {
            name: "nodata",
            value: nodata.len().to_string(),
            reason: format!("expected one NoData entry per layer ({})", layers.len()),
        });
    }
    if rest.len() > i16::MAX as usize {
        return Err(Error::InvalidParameter {
            name: "layers",
            value: layers.len().to_string(),
            reason: "change counts must fit the 16-bit output".into(),
        });
    }
    config.validate()?;

    let mut summary = FrequencySummary::default();

    for block in iter_blocks(first, config, progress) {
        let block = block?;
        let window = block.window;
        let aoi_block = read_aoi_block(aoi, &window)?;

        let mut valid = validity_mask(block.values.view(), nodata[0], aoi_block.as_ref().map(|a| a.view()))?;
        let mut previous = block.values;
        let mut counts = Array2::<i16>::zeros(previous.dim());

        for (layer, &nd) in rest.iter().zip(&nodata[1..]) {
            let current = read_window(*layer, &window)?;
            conjunct(&mut valid, &validity_mask(current.view(), nd, None)?)?;

            Zip::from(&mut counts)
                .and(&previous)
                .and(&current)
                .and(&valid)
                .for_each(|n, prev, cur, &ok| {
                    if ok && prev != cur {
                        *n += 1;
                    }
                });
            previous = current;
        }

        let output = Zip::from(&counts)
            .and(&valid)
            .map_collect(|&n, &ok| if ok { n } else { FREQUENCY_NODATA });

        for &v in output.iter() {
            if v == FREQUENCY_NODATA {
                summary.nodata_cells += 1;
            } else {
                *summary.histogram.entry(v).or_insert(0) += 1;
            }
        }

        writer.write_block(&window, output.view())?;
    }

    Ok(summary)
}
