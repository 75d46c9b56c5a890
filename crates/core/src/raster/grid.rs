//! In-memory raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

/// A georeferenced 2D raster grid held fully in memory.
///
/// `Raster<T>` is what GeoTIFF decoding produces and what output writers
/// fill. The change engine never reads it directly: it is exposed to the
/// engine through [`crate::layer::MemoryLayer`], which serves block reads.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    /// NoData sentinel, kept as `f64` so overrides of any sample type fit
    nodata: Option<f64>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// View of the window starting at (col, row), or `None` if it leaves the grid
    pub fn window(&self, col: usize, row: usize, cols: usize, rows: usize) -> Option<ArrayView2<'_, T>> {
        if col + cols > self.cols() || row + rows > self.rows() {
            return None;
        }
        Some(self.data.slice(s![row..row + rows, col..col + cols]))
    }

    /// Mutable view of the window starting at (col, row)
    pub fn window_mut(
        &mut self,
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
    ) -> Option<ArrayViewMut2<'_, T>> {
        if col + cols > self.cols() || row + rows > self.rows() {
            return None;
        }
        Some(self.data.slice_mut(s![row..row + rows, col..col + cols]))
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }
}
