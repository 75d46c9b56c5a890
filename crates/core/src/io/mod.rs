//! I/O operations for reading and writing class rasters

mod chunked;
#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

pub use chunked::{stream_geotiff, GeoTiffLayer};

#[cfg(feature = "gdal")]
pub use gdal_io::{GdalBlockWriter, GdalLayer};

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiffOptions, SampleType,
};
