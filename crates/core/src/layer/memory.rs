//! In-memory raster provider

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::layer::provider::{snap_extent_to_grid, RasterProvider};
use crate::raster::{Extent, GeoTransform, Raster, RasterElement};
use ndarray::Array2;

/// Serves block reads from a fully decoded [`Raster`].
#[derive(Debug, Clone)]
pub struct MemoryLayer<T: RasterElement> {
    raster: Raster<T>,
}

impl<T: RasterElement> MemoryLayer<T> {
    pub fn new(raster: Raster<T>) -> Self {
        Self { raster }
    }

    /// Build a layer from row-major values on `transform`
    pub fn from_rows(values: Vec<Vec<T>>, transform: GeoTransform) -> Result<Self> {
        let rows = values.len();
        let cols = values.first().map_or(0, Vec::len);
        if values.iter().any(|r| r.len() != cols) {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let mut raster = Raster::from_vec(values.into_iter().flatten().collect(), rows, cols)?;
        raster.set_transform(transform);
        Ok(Self::new(raster))
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.raster.set_nodata(nodata);
        self
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.raster.set_crs(crs);
        self
    }

    pub fn raster(&self) -> &Raster<T> {
        &self.raster
    }
}

impl<T: RasterElement> From<Raster<T>> for MemoryLayer<T> {
    fn from(raster: Raster<T>) -> Self {
        Self::new(raster)
    }
}

impl<T: RasterElement> RasterProvider for MemoryLayer<T> {
    type Cell = T;

    fn width(&self) -> usize {
        self.raster.cols()
    }

    fn height(&self) -> usize {
        self.raster.rows()
    }

    fn transform(&self) -> GeoTransform {
        *self.raster.transform()
    }

    fn crs(&self) -> Option<&CRS> {
        self.raster.crs()
    }

    fn nodata(&self) -> Option<f64> {
        self.raster.nodata()
    }

    fn read_block(&self, extent: &Extent, cols: usize, rows: usize) -> Result<Array2<T>> {
        let (col, row) = snap_extent_to_grid(
            self.raster.transform(),
            extent,
            cols,
            rows,
            self.width(),
            self.height(),
        )?;

        self.raster
            .window(col, row, cols, rows)
            .map(|view| view.to_owned())
            .ok_or_else(|| Error::LayerRead {
                col,
                row,
                cols,
                rows,
                reason: "window outside raster".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_block_by_extent() {
        let gt = GeoTransform::new(0.0, 3.0, 1.0, -1.0);
        let layer = MemoryLayer::from_rows(
            vec![vec![1u8, 2, 3], vec![4, 5, 6], vec![7, 8, 9]],
            gt,
        )
        .unwrap();

        let block = layer.read_block(&gt.window_extent(1, 1, 2, 2), 2, 2).unwrap();
        assert_eq!(block, ndarray::array![[5, 6], [8, 9]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = MemoryLayer::from_rows(vec![vec![1u8, 2], vec![3]], GeoTransform::default());
        assert!(result.is_err());
    }
}
