//! Chunk-wise GeoTIFF access without GDAL
//!
//! [`GeoTiffLayer`] answers block reads by decoding only the strips or tiles
//! a block touches. [`stream_geotiff`] writes a striped GeoTIFF one block row
//! at a time, so neither side holds a full raster.

use super::native::{
    cast_decoded, read_crs, read_geotransform, read_nodata, tiff_error, write_geo_tags, GeoTiffOptions, SampleType,
};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::layer::{snap_extent_to_grid, BlockWindow, BlockWriter, RasterProvider};
use crate::raster::{Extent, GeoTransform, RasterElement};
use ndarray::{s, Array2, ArrayView2};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::marker::PhantomData;
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8, GrayI16, GrayI32};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::ColorType as SampleLayout;

/// A decoded strip or tile, keyed by its index in the file
struct Chunk<T> {
    index: u32,
    values: Array2<T>,
}

/// A single-band GeoTIFF served block by block from its strips or tiles.
///
/// Chunks decoded for one block are kept until the next read, so the blocks
/// of one block row share the strips they overlap.
pub struct GeoTiffLayer<T> {
    decoder: RefCell<Decoder<BufReader<File>>>,
    cache: RefCell<Vec<Chunk<T>>>,
    width: usize,
    height: usize,
    chunk_cols: usize,
    chunk_rows: usize,
    chunks_across: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

impl<T: RasterElement> GeoTiffLayer<T> {
    /// Open the first image of the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| tiff_error("TIFF decode error", e))?;

        match decoder.colortype().map_err(|e| tiff_error("Cannot read color type", e))? {
            SampleLayout::Gray(_) => {}
            other => {
                return Err(Error::UnsupportedDataType(format!(
                    "expected a single-band image, got {:?}",
                    other
                )))
            }
        }

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| tiff_error("Cannot read dimensions", e))?;
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }

        let (chunk_cols, chunk_rows) = decoder.chunk_dimensions();
        let chunk_cols = (chunk_cols as usize).clamp(1, width);
        let chunk_rows = (chunk_rows as usize).clamp(1, height);

        let transform = read_geotransform(&mut decoder).unwrap_or_default();
        let crs = read_crs(&mut decoder);
        let nodata = read_nodata(&mut decoder);

        Ok(Self {
            decoder: RefCell::new(decoder),
            cache: RefCell::new(Vec::new()),
            width,
            height,
            chunk_cols,
            chunk_rows,
            chunks_across: width.div_ceil(chunk_cols),
            transform,
            crs,
            nodata,
        })
    }

    fn decode_chunk(&self, index: u32) -> std::result::Result<Array2<T>, String> {
        let mut decoder = self.decoder.borrow_mut();
        let (cols, rows) = decoder.chunk_data_dimensions(index);
        let result = decoder.read_chunk(index).map_err(|e| e.to_string())?;
        let values: Vec<T> = cast_decoded(result).map_err(|e| e.to_string())?;
        Array2::from_shape_vec((rows as usize, cols as usize), values).map_err(|e| e.to_string())
    }
}

impl<T: RasterElement> RasterProvider for GeoTiffLayer<T> {
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

        let mut block = Array2::zeros((rows, cols));
        if rows == 0 || cols == 0 {
            return Ok(block);
        }

        let mut previous = std::mem::take(&mut *self.cache.borrow_mut());
        let mut current = Vec::new();

        for chunk_row in row / self.chunk_rows..=(row + rows - 1) / self.chunk_rows {
            for chunk_col in col / self.chunk_cols..=(col + cols - 1) / self.chunk_cols {
                let index = (chunk_row * self.chunks_across + chunk_col) as u32;
                let chunk = match previous.iter().position(|c| c.index == index) {
                    Some(i) => previous.swap_remove(i),
                    None => Chunk {
                        index,
                        values: self.decode_chunk(index).map_err(read_error)?,
                    },
                };

                // Overlap of the block and the chunk, in layer pixels
                let (top, left) = (chunk_row * self.chunk_rows, chunk_col * self.chunk_cols);
                let (chunk_h, chunk_w) = chunk.values.dim();
                let r0 = row.max(top);
                let r1 = (row + rows).min(top + chunk_h);
                let c0 = col.max(left);
                let c1 = (col + cols).min(left + chunk_w);
                if r0 < r1 && c0 < c1 {
                    block
                        .slice_mut(s![r0 - row..r1 - row, c0 - col..c1 - col])
                        .assign(&chunk.values.slice(s![r0 - top..r1 - top, c0 - left..c1 - left]));
                }
                current.push(chunk);
            }
        }

        *self.cache.borrow_mut() = current;
        Ok(block)
    }
}

/// Stream blocks into a new single-band GeoTIFF on the grid of `like`.
///
/// `fill` receives a [`BlockWriter`] that accepts blocks in row-major block
/// order, `band_rows` rows at a time (the block height of the traversal).
/// Each completed band of rows is encoded as one strip and dropped.
pub fn stream_geotiff<T, L, P, R, F>(
    path: P,
    like: &L,
    nodata: Option<f64>,
    options: GeoTiffOptions,
    band_rows: usize,
    fill: F,
) -> Result<R>
where
    T: RasterElement,
    L: RasterProvider + ?Sized,
    P: AsRef<Path>,
    F: FnOnce(&mut dyn BlockWriter<T>) -> Result<R>,
{
    if band_rows == 0 {
        return Err(Error::InvalidParameter {
            name: "band_rows",
            value: band_rows.to_string(),
            reason: "must be positive".into(),
        });
    }

    let file = BufWriter::new(File::create(path.as_ref())?);
    let fallback = nodata.unwrap_or(0.0);
    match options.sample_type {
        SampleType::Byte => {
            let fallback = num_traits::cast(fallback).unwrap_or(0);
            stream_image::<Gray8, _, _, _, _, _>(file, like, nodata, band_rows, fallback, fill)
        }
        SampleType::Int16 => {
            let fallback = num_traits::cast(fallback).unwrap_or(0);
            stream_image::<GrayI16, _, _, _, _, _>(file, like, nodata, band_rows, fallback, fill)
        }
        SampleType::Int32 => {
            let fallback = num_traits::cast(fallback).unwrap_or(0);
            stream_image::<GrayI32, _, _, _, _, _>(file, like, nodata, band_rows, fallback, fill)
        }
        SampleType::Float32 => stream_image::<Gray32Float, _, _, _, _, _>(file, like, nodata, band_rows, f32::NAN, fill),
    }
}

fn stream_image<C, W, T, L, R, F>(
    writer: W,
    like: &L,
    nodata: Option<f64>,
    band_rows: usize,
    fallback: C::Inner,
    fill: F,
) -> Result<R>
where
    C: ColorType,
    C::Inner: num_traits::NumCast + Copy,
    [C::Inner]: TiffValue,
    W: Write + Seek,
    T: RasterElement,
    L: RasterProvider + ?Sized,
    F: FnOnce(&mut dyn BlockWriter<T>) -> Result<R>,
{
    let (width, height) = (like.width(), like.height());
    let band_rows = band_rows.min(height.max(1));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_error("TIFF encoder error", e))?;
    let mut image = encoder
        .new_image::<C>(width as u32, height as u32)
        .map_err(|e| tiff_error("Cannot create TIFF image", e))?;
    image
        .rows_per_strip(band_rows as u32)
        .map_err(|e| tiff_error("Cannot set strip height", e))?;
    write_geo_tags(image.encoder(), &like.transform(), like.crs(), nodata)?;

    let mut sink = StripSink {
        image: Some(image),
        width,
        height,
        band_rows,
        band: vec![fallback; band_rows * width],
        band_row: 0,
        filled: 0,
        fallback,
        _cell: PhantomData,
    };
    let result = fill(&mut sink)?;
    sink.finish()?;
    Ok(result)
}

/// Assembles one band of rows, then hands it to the encoder as a strip
struct StripSink<'a, W, C, K, T>
where
    W: Write + Seek + 'a,
    C: ColorType,
    K: TiffKind,
{
    image: Option<ImageEncoder<'a, W, C, K>>,
    width: usize,
    height: usize,
    band_rows: usize,
    band: Vec<C::Inner>,
    /// First layer row of the band being assembled
    band_row: usize,
    /// Cells of the band written so far
    filled: usize,
    fallback: C::Inner,
    _cell: PhantomData<T>,
}

impl<'a, W, C, K, T> StripSink<'a, W, C, K, T>
where
    W: Write + Seek + 'a,
    C: ColorType,
    C::Inner: num_traits::NumCast + Copy,
    [C::Inner]: TiffValue,
    K: TiffKind,
    T: RasterElement,
{
    fn current_rows(&self) -> usize {
        self.band_rows.min(self.height - self.band_row)
    }

    fn flush_band(&mut self) -> Result<()> {
        let len = self.current_rows() * self.width;
        let image = self
            .image
            .as_mut()
            .ok_or_else(|| Error::Other("GeoTIFF stream already finished".into()))?;
        image
            .write_strip(&self.band[..len])
            .map_err(|e| tiff_error("Cannot write strip", e))?;
        self.band_row += self.current_rows();
        self.filled = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.band_row != self.height {
            return Err(Error::Other(format!(
                "GeoTIFF stream ended at row {} of {}",
                self.band_row, self.height
            )));
        }
        match self.image.take() {
            Some(image) => image.finish().map_err(|e| tiff_error("Cannot finish GeoTIFF", e)),
            None => Ok(()),
        }
    }
}

impl<'a, W, C, K, T> BlockWriter<T> for StripSink<'a, W, C, K, T>
where
    W: Write + Seek + 'a,
    C: ColorType,
    C::Inner: num_traits::NumCast + Copy,
    [C::Inner]: TiffValue,
    K: TiffKind,
    T: RasterElement,
{
    fn write_block(&mut self, window: &BlockWindow, values: ArrayView2<'_, T>) -> Result<()> {
        if values.dim() != (window.rows, window.cols) {
            return Err(Error::SizeMismatch {
                er: window.rows,
                ec: window.cols,
                ar: values.nrows(),
                ac: values.ncols(),
            });
        }
        if self.band_row >= self.height
            || window.row != self.band_row
            || window.rows != self.current_rows()
            || window.col + window.cols > self.width
        {
            return Err(Error::Other(format!(
                "block at ({}, {}) is out of row-major order, expected row {}",
                window.col, window.row, self.band_row
            )));
        }

        for (r, line) in values.outer_iter().enumerate() {
            let start = r * self.width + window.col;
            for (cell, &v) in self.band[start..start + window.cols].iter_mut().zip(line.iter()) {
                *cell = num_traits::cast(v).unwrap_or(self.fallback);
            }
        }

        self.filled += window.len();
        if self.filled == self.current_rows() * self.width {
            self.flush_band()?;
        }
        Ok(())
    }
}
