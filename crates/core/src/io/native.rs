//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Only the georeferencing needed for change
//! accounting is handled: pixel scale + tiepoint, the EPSG code from the
//! GeoKey directory and the GDAL NoData tag. [`read_geotiff`] decodes the
//! whole image; [`GeoTiffLayer`](super::GeoTiffLayer) reads it chunk by chunk.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8, GrayI16, GrayI32};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u32 = 1024;
const GT_RASTER_TYPE_KEY: u32 = 1025;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;

/// Sample type written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    Byte,
    Int16,
    Int32,
    #[default]
    Float32,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
}

impl GeoTiffOptions {
    pub fn with_sample_type(sample_type: SampleType) -> Self {
        Self { sample_type }
    }
}

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

pub(super) fn tiff_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Other(format!("{}: {}", context, e))
}

fn cast_all<S, T>(buf: Vec<S>) -> Result<Vec<T>>
where
    S: num_traits::NumCast + Copy + std::fmt::Display,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| {
            num_traits::cast::<S, T>(v).ok_or_else(|| {
                Error::UnsupportedDataType(format!("value {} does not fit {}", v, T::type_name()))
            })
        })
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_error("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_error("Cannot read dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| tiff_error("Cannot read image data", e))?;
    let data: Vec<T> = cast_decoded(result)?;

    if data.len() != rows * cols {
        // Multi-sample images interleave bands
        return Err(Error::UnsupportedDataType(format!(
            "expected one sample per pixel, got {} samples for {}x{}",
            data.len(),
            cols,
            rows
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

/// Widen or narrow decoded samples to `T`
pub(super) fn cast_decoded<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    Ok(match result {
        DecodingResult::U8(buf) => cast_all(buf)?,
        DecodingResult::U16(buf) => cast_all(buf)?,
        DecodingResult::U32(buf) => cast_all(buf)?,
        DecodingResult::U64(buf) => cast_all(buf)?,
        DecodingResult::I8(buf) => cast_all(buf)?,
        DecodingResult::I16(buf) => cast_all(buf)?,
        DecodingResult::I32(buf) => cast_all(buf)?,
        DecodingResult::I64(buf) => cast_all(buf)?,
        DecodingResult::F32(buf) => cast_all(buf)?,
        DecodingResult::F64(buf) => cast_all(buf)?,
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".into())),
    })
}

pub(super) fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

pub(super) fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header [version, revision, minor, count] then [id, location, count, value] entries
    let count = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(count)
        .find_map(|entry| match (entry[0], entry[1], entry[3]) {
            (PROJECTED_CS_TYPE_KEY, 0, code) | (GEOGRAPHIC_TYPE_KEY, 0, code)
                if code > 0 && code != 32767 =>
            {
                Some(CRS::from_epsg(code))
            }
            _ => None,
        })
}

pub(super) fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    text.trim_end_matches('\0').trim().parse::<f64>().ok()
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn convert<T: RasterElement, U: num_traits::NumCast>(raster: &Raster<T>, fallback: U) -> Vec<U>
where
    U: Copy,
{
    raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(fallback))
        .collect()
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let fallback = raster.nodata().unwrap_or(0.0);
    match options.sample_type {
        SampleType::Byte => {
            let data: Vec<u8> = convert(raster, num_traits::cast(fallback).unwrap_or(0));
            encode_image::<Gray8, _, T>(raster, writer, &data)
        }
        SampleType::Int16 => {
            let data: Vec<i16> = convert(raster, num_traits::cast(fallback).unwrap_or(0));
            encode_image::<GrayI16, _, T>(raster, writer, &data)
        }
        SampleType::Int32 => {
            let data: Vec<i32> = convert(raster, num_traits::cast(fallback).unwrap_or(0));
            encode_image::<GrayI32, _, T>(raster, writer, &data)
        }
        SampleType::Float32 => {
            let data: Vec<f32> = convert(raster, f32::NAN);
            encode_image::<Gray32Float, _, T>(raster, writer, &data)
        }
    }
}

fn encode_image<C, W, T>(raster: &Raster<T>, writer: W, data: &[C::Inner]) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
    T: RasterElement,
{
    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_error("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| tiff_error("Cannot create TIFF image", e))?;

    write_geo_tags(image.encoder(), raster.transform(), raster.crs(), raster.nodata())?;

    image
        .write_data(data)
        .map_err(|e| tiff_error("Cannot write image data", e))?;

    Ok(())
}

pub(super) fn write_geo_tags<W, K>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    gt: &GeoTransform,
    crs: Option<&CRS>,
    nodata: Option<f64>,
) -> Result<()>
where
    W: Write + Seek,
    K: TiffKind,
{
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| tiff_error("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| tiff_error("Cannot write tiepoint tag", e))?;

    let geokeys = geokey_directory(crs);
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(|e| tiff_error("Cannot write geokey tag", e))?;

    if let Some(nd) = nodata {
        let text = format!("{}", nd);
        dir.write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| tiff_error("Cannot write nodata tag", e))?;
    }

    Ok(())
}

/// GeoKey directory with the model type and, when known, the EPSG code.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    // EPSG 4000-4999 are geographic systems
    let epsg = crs.and_then(CRS::epsg).filter(|code| *code <= u16::MAX as u32);
    let geographic = matches!(epsg, Some(4000..=4999));

    let mut keys: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY as u16, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE_KEY as u16, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.push([key as u16, 0, 1, code as u16]);
    }

    let mut dir = vec![1, 1, 0, keys.len() as u16];
    dir.extend(keys.into_iter().flatten());
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_raster() -> Raster<f64> {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, 3.0, 255.0, 4.0, 5.0], 2, 3).unwrap();
        raster.set_transform(GeoTransform::new(300000.0, 6300000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::from_epsg(32719)));
        raster.set_nodata(Some(255.0));
        raster
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let raster = sample_raster();
        let bytes = write_geotiff_to_buffer(&raster, Some(GeoTiffOptions::with_sample_type(SampleType::Byte)))
            .unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(loaded.shape(), (2, 3));
        assert_eq!(loaded.data()[[1, 0]], 255.0);
        assert_eq!(loaded.nodata(), Some(255.0));
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(32719));
        assert_eq!(loaded.transform(), raster.transform());
    }

    #[test]
    fn test_file_roundtrip_int16() {
        let mut raster: Raster<i16> = Raster::from_vec(vec![-1, 0, 1, 2], 2, 2).unwrap();
        raster.set_nodata(Some(-1.0));

        let tmp = NamedTempFile::new().unwrap();
        write_geotiff(&raster, tmp.path(), Some(GeoTiffOptions::with_sample_type(SampleType::Int16))).unwrap();

        let loaded: Raster<i16> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(loaded.data(), raster.data());
        assert_eq!(loaded.nodata(), Some(-1.0));
    }

    #[test]
    fn test_geokeys_geographic() {
        let dir = geokey_directory(Some(&CRS::from_epsg(4326)));
        assert_eq!(&dir[..4], &[1, 1, 0, 3]);
        assert_eq!(&dir[4..8], &[1024, 0, 1, 2]);
        assert_eq!(&dir[12..16], &[2048, 0, 1, 4326]);
    }
}
