//! Raster provider capability

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Extent, GeoTransform, RasterElement};
use ndarray::Array2;
use serde::Serialize;

/// Tolerance, in pixels, when mapping a requested extent back onto the grid
const GRID_SNAP_TOLERANCE: f64 = 1e-6;

/// A georeferenced categorical raster that can be read block by block.
///
/// Blocks are requested by geographic rectangle plus output shape, the way a
/// map-provider API serves them, so any backend able to answer "give me this
/// rectangle at this resolution" can be tiled by the engine.
pub trait RasterProvider {
    /// Decoded sample type
    type Cell: RasterElement;

    /// Number of columns
    fn width(&self) -> usize;

    /// Number of rows
    fn height(&self) -> usize;

    fn transform(&self) -> GeoTransform;

    fn crs(&self) -> Option<&CRS>;

    /// Declared NoData sentinel, if any
    fn nodata(&self) -> Option<f64>;

    /// Read exactly `cols` x `rows` cells covering `extent`.
    fn read_block(&self, extent: &Extent, cols: usize, rows: usize) -> Result<Array2<Self::Cell>>;

    fn pixel_size(&self) -> (f64, f64) {
        self.transform().pixel_size()
    }

    fn extent(&self) -> Extent {
        self.transform().extent(self.width(), self.height())
    }
}

/// Rasterized area-of-interest layer: 1 inside, anything else outside.
pub type MaskLayer<'a> = &'a dyn RasterProvider<Cell = u8>;

/// Map a requested extent to the pixel offset of its upper-left cell.
///
/// Fails with [`Error::LayerRead`] when the extent does not start on a cell
/// boundary or the window leaves the `width` x `height` grid, and with
/// [`Error::Configuration`] for a rotated grid.
pub fn snap_extent_to_grid(
    transform: &GeoTransform,
    extent: &Extent,
    cols: usize,
    rows: usize,
    width: usize,
    height: usize,
) -> Result<(usize, usize)> {
    if transform.is_rotated() {
        return Err(Error::Configuration("rotated geotransforms are not supported".into()));
    }

    let (col_f, row_f) = transform.extent_origin(extent);

    let read_error = |col: usize, row: usize, reason: String| Error::LayerRead {
        col,
        row,
        cols,
        rows,
        reason,
    };

    if !col_f.is_finite() || !row_f.is_finite() {
        return Err(read_error(0, 0, "degenerate geotransform".into()));
    }

    let col = col_f.round();
    let row = row_f.round();
    if (col - col_f).abs() > GRID_SNAP_TOLERANCE || (row - row_f).abs() > GRID_SNAP_TOLERANCE {
        return Err(read_error(
            col.max(0.0) as usize,
            row.max(0.0) as usize,
            format!("extent is not aligned to the grid (offset {:.6}, {:.6})", col_f, row_f),
        ));
    }
    if col < 0.0 || row < 0.0 {
        return Err(read_error(0, 0, "extent starts outside the layer".into()));
    }

    let (col, row) = (col as usize, row as usize);
    if col + cols > width || row + rows > height {
        return Err(read_error(col, row, format!("window exceeds {}x{} layer", width, height)));
    }

    Ok((col, row))
}

/// Snapshot of a layer's grid geometry, used by alignment validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
    pub sample_type: &'static str,
}

impl LayerInfo {
    pub fn of<P: RasterProvider + ?Sized>(name: impl Into<String>, layer: &P) -> Self {
        Self {
            name: name.into(),
            width: layer.width(),
            height: layer.height(),
            transform: layer.transform(),
            crs: layer.crs().cloned(),
            nodata: layer.nodata(),
            sample_type: <P::Cell as RasterElement>::type_name(),
        }
    }

    pub fn extent(&self) -> Extent {
        self.transform.extent(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_aligned_extent() {
        let gt = GeoTransform::new(1000.0, 2000.0, 10.0, -10.0);
        let e = gt.window_extent(4, 2, 3, 3);
        assert_eq!(snap_extent_to_grid(&gt, &e, 3, 3, 10, 10).unwrap(), (4, 2));
    }

    #[test]
    fn test_snap_rejects_misaligned_and_outside() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let shifted = Extent::new(0.5, 90.0, 3.5, 100.0);
        assert!(matches!(
            snap_extent_to_grid(&gt, &shifted, 3, 10, 100, 100),
            Err(Error::LayerRead { .. })
        ));

        let e = gt.window_extent(98, 0, 4, 1);
        assert!(snap_extent_to_grid(&gt, &e, 4, 1, 100, 100).is_err());

        let rotated = GeoTransform::from_gdal([0.0, 1.0, 0.0, 100.0, 0.1, -1.0]);
        let e = rotated.window_extent(0, 0, 2, 2);
        assert!(matches!(
            snap_extent_to_grid(&rotated, &e, 2, 2, 10, 10),
            Err(Error::Configuration(_))
        ));
    }
}
