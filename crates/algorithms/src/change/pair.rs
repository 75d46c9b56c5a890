//! Lockstep traversal of two aligned layers

use super::mask::{conjunct, read_aoi_block, validity_mask};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{iter_blocks, read_window, BlockWindow, MaskLayer, Progress, RasterProvider};
use lulc_core::Result;
use ndarray::Array2;
use std::ops::ControlFlow;

/// One block position of a (t0, t1) pair with its conjuncted validity
pub(crate) struct PairBlock<A, B> {
    pub window: BlockWindow,
    pub t0: Array2<A>,
    pub t1: Array2<B>,
    pub valid: Array2<bool>,
}

/// A layer together with the NoData sentinel it is analysed with
pub(crate) struct Side<'a, P: ?Sized> {
    pub layer: &'a P,
    pub nodata: Option<f64>,
}

/// Visit every block of `first`, reading `second` and the AOI at the same
/// window. The progress observer fires once per block of `first`.
///
/// `visit` may stop the traversal early by returning `ControlFlow::Break`.
pub(crate) fn traverse_pair<P0, P1, F>(
    first: Side<'_, P0>,
    second: Side<'_, P1>,
    aoi: Option<MaskLayer<'_>>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
    mut visit: F,
) -> Result<()>
where
    P0: RasterProvider + ?Sized,
    P1: RasterProvider + ?Sized,
    F: FnMut(PairBlock<P0::Cell, P1::Cell>) -> Result<ControlFlow<()>>,
{
    config.validate()?;

    for block in iter_blocks(first.layer, config, progress) {
        let block = block?;
        let t1 = read_window(second.layer, &block.window)?;
        let aoi_block = read_aoi_block(aoi, &block.window)?;

        let mut valid = validity_mask(block.values.view(), first.nodata, aoi_block.as_ref().map(|a| a.view()))?;
        conjunct(&mut valid, &validity_mask(t1.view(), second.nodata, None)?)?;

        let step = visit(PairBlock {
            window: block.window,
            t0: block.values,
            t1,
            valid,
        })?;
        if step.is_break() {
            break;
        }
    }

    Ok(())
}
