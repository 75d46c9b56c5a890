//! Streaming GeoTIFF access through GDAL
//!
//! [`GdalLayer`] answers block reads with windowed band reads, so only one
//! block per layer is resident at a time. [`GdalBlockWriter`] streams output
//! blocks straight into a tiled GeoTIFF.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::layer::{snap_extent_to_grid, BlockWindow, BlockWriter, RasterProvider};
use crate::raster::{Extent, GeoTransform, RasterElement};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, ArrayView2};
use std::marker::PhantomData;
use std::path::Path;

/// Block size of written tiled GeoTIFFs
const OUTPUT_TILE_SIZE: usize = 256;

/// A single band of a GDAL dataset served block by block
pub struct GdalLayer<T> {
    dataset: Dataset,
    band: usize,
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
    _cell: PhantomData<T>,
}

impl<T: RasterElement + GdalType> GdalLayer<T> {
    /// Open band 1 of the dataset at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_band(path, 1)
    }

    /// Open a band (1-indexed) of the dataset at `path`
    pub fn open_band<P: AsRef<Path>>(path: P, band: usize) -> Result<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();

        let transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .unwrap_or_default();

        let crs = dataset.spatial_ref().ok().and_then(|srs| {
            let wkt = srs.to_wkt().ok()?;
            let crs = CRS::from_wkt(wkt);
            Some(match srs.auth_code() {
                Ok(code) => crs.with_epsg(code as u32),
                Err(_) => crs,
            })
        });

        let nodata = dataset.rasterband(band)?.no_data_value();

        Ok(Self {
            dataset,
            band,
            width,
            height,
            transform,
            crs,
            nodata,
            _cell: PhantomData,
        })
    }
}

impl<T: RasterElement + GdalType + Copy> RasterProvider for GdalLayer<T> {
    type Cell = T;

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn transform(&self) -> GeoTransform {
        self.transform
    }

    fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_block(&self, extent: &Extent, cols: usize, rows: usize) -> Result<Array2<T>> {
        let (col, row) = snap_extent_to_grid(&self.transform, extent, cols, rows, self.width, self.height)?;
        let read_error = |reason: String| Error::LayerRead {
            col,
            row,
            cols,
            rows,
            reason,
        };

        let band = self
            .dataset
            .rasterband(self.band)
            .map_err(|e| read_error(e.to_string()))?;
        let buffer = band
            .read_as::<T>((col as isize, row as isize), (cols, rows), (cols, rows), None)
            .map_err(|e| read_error(e.to_string()))?;

        Array2::from_shape_vec((rows, cols), buffer.data().to_vec()).map_err(|e| read_error(e.to_string()))
    }
}

/// Writes blocks into a new single-band tiled GeoTIFF
pub struct GdalBlockWriter<T> {
    dataset: Dataset,
    _cell: PhantomData<T>,
}

impl<T: RasterElement + GdalType + Copy> GdalBlockWriter<T> {
    /// Create `path` with the grid of `like`
    pub fn create<P, L>(path: P, like: &L, nodata: Option<f64>) -> Result<Self>
    where
        P: AsRef<Path>,
        L: RasterProvider + ?Sized,
    {
        let driver = DriverManager::get_driver_by_name("GTiff")?;

        let mut options = CslStringList::new();
        options.set_name_value("COMPRESS", "DEFLATE")?;
        options.set_name_value("TILED", "YES")?;
        options.set_name_value("BLOCKXSIZE", &OUTPUT_TILE_SIZE.to_string())?;
        options.set_name_value("BLOCKYSIZE", &OUTPUT_TILE_SIZE.to_string())?;

        let mut dataset = driver.create_with_band_type_with_options::<T, _>(
            path.as_ref(),
            like.width(),
            like.height(),
            1,
            &options,
        )?;

        dataset.set_geo_transform(&like.transform().to_gdal())?;

        if let Some(crs) = like.crs() {
            let srs = match (crs.epsg(), crs.wkt()) {
                (Some(code), _) => Some(SpatialRef::from_epsg(code)?),
                (None, Some(wkt)) => Some(SpatialRef::from_wkt(wkt)?),
                _ => None,
            };
            if let Some(srs) = srs {
                dataset.set_spatial_ref(&srs)?;
            }
        }

        if nodata.is_some() {
            dataset.rasterband(1)?.set_no_data_value(nodata)?;
        }

        Ok(Self {
            dataset,
            _cell: PhantomData,
        })
    }
}

impl<T: RasterElement + GdalType + Copy> BlockWriter<T> for GdalBlockWriter<T> {
    fn write_block(&mut self, window: &BlockWindow, values: ArrayView2<'_, T>) -> Result<()> {
        if values.dim() != (window.rows, window.cols) {
            return Err(Error::SizeMismatch {
                er: window.rows,
                ec: window.cols,
                ar: values.nrows(),
                ac: values.ncols(),
            });
        }

        let mut band = self.dataset.rasterband(1)?;
        let mut buffer = Buffer::new((window.cols, window.rows), values.iter().copied().collect());
        band.write(
            (window.col as isize, window.row as isize),
            (window.cols, window.rows),
            &mut buffer,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{iter_blocks, MemoryLayer, NoProgress};
    use crate::config::BlockConfig;
    use crate::raster::Raster;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_then_stream_blocks() {
        let mut raster: Raster<u8> = Raster::from_array(Array2::from_shape_fn((40, 30), |(r, c)| ((r + c) % 7) as u8));
        raster.set_transform(GeoTransform::new(0.0, 400.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32719)));
        let source = MemoryLayer::new(raster.clone());

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        {
            let mut writer: GdalBlockWriter<u8> = GdalBlockWriter::create(tmp.path(), &source, Some(255.0)).unwrap();
            let mut progress = NoProgress;
            for block in iter_blocks(&source, &BlockConfig::square(16), &mut progress) {
                let block = block.unwrap();
                writer.write_block(&block.window, block.values.view()).unwrap();
            }
        }

        let layer: GdalLayer<u8> = GdalLayer::open(tmp.path()).unwrap();
        assert_eq!(layer.width(), 30);
        assert_eq!(layer.height(), 40);
        assert_eq!(layer.nodata(), Some(255.0));

        let gt = layer.transform();
        let block = layer.read_block(&gt.window_extent(10, 20, 5, 5), 5, 5).unwrap();
        assert_eq!(block[[0, 0]], raster.data()[[20, 10]]);
        assert_eq!(block[[4, 4]], raster.data()[[24, 14]]);
    }
}
