//! Streaming output of block results

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::layer::blocks::BlockWindow;
use crate::layer::provider::RasterProvider;
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::ArrayView2;

/// Sink for block results written at arbitrary offsets before finalization.
pub trait BlockWriter<T> {
    fn write_block(&mut self, window: &BlockWindow, values: ArrayView2<'_, T>) -> Result<()>;
}

/// Collects written blocks into an in-memory [`Raster`].
#[derive(Debug, Clone)]
pub struct RasterWriter<T: RasterElement> {
    raster: Raster<T>,
}

impl<T: RasterElement> RasterWriter<T> {
    pub fn new(
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: Option<CRS>,
        nodata: Option<f64>,
    ) -> Self {
        let mut raster = Raster::new(rows, cols);
        raster.set_transform(transform);
        raster.set_crs(crs);
        raster.set_nodata(nodata);
        Self { raster }
    }

    /// Writer on the same grid as `layer`
    pub fn like<P: RasterProvider + ?Sized>(layer: &P, nodata: Option<f64>) -> Self {
        Self::new(
            layer.height(),
            layer.width(),
            layer.transform(),
            layer.crs().cloned(),
            nodata,
        )
    }

    /// Finalize and hand back the assembled raster
    pub fn finish(self) -> Raster<T> {
        self.raster
    }
}

impl<T: RasterElement> BlockWriter<T> for RasterWriter<T> {
    fn write_block(&mut self, window: &BlockWindow, values: ArrayView2<'_, T>) -> Result<()> {
        if values.dim() != (window.rows, window.cols) {
            return Err(Error::SizeMismatch {
                er: window.rows,
                ec: window.cols,
                ar: values.nrows(),
                ac: values.ncols(),
            });
        }

        let (rows, cols) = self.raster.shape();
        let mut target = self
            .raster
            .window_mut(window.col, window.row, window.cols, window.rows)
            .ok_or(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: window.row + window.rows,
                ac: window.col + window.cols,
            })?;
        target.assign(&values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_write_blocks_at_offsets() {
        let mut writer: RasterWriter<i16> =
            RasterWriter::new(3, 3, GeoTransform::default(), None, Some(-1.0));

        writer
            .write_block(&BlockWindow::new(0, 0, 2, 2), array![[1, 2], [3, 4]].view())
            .unwrap();
        writer
            .write_block(&BlockWindow::new(2, 0, 1, 3), array![[5], [6], [7]].view())
            .unwrap();

        let raster = writer.finish();
        assert_eq!(raster.data()[[1, 1]], 4);
        assert_eq!(raster.data()[[2, 2]], 7);
        assert_eq!(raster.nodata(), Some(-1.0));
    }

    #[test]
    fn test_write_outside_rejected() {
        let mut writer: RasterWriter<u8> = RasterWriter::new(2, 2, GeoTransform::default(), None, None);
        let result = writer.write_block(&BlockWindow::new(1, 1, 2, 2), array![[1, 2], [3, 4]].view());
        assert!(result.is_err());
    }
}
