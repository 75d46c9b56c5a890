//! # lulc core
//!
//! Core types, traits and I/O for land-use/land-cover change accounting.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform` and `Extent`: georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `RasterProvider`: block-readable layers and the block traversal built on it
//! - Alignment and NoData validation of a layer series
//! - I/O for GeoTIFF

pub mod config;
pub mod crs;
pub mod error;
pub mod io;
pub mod layer;
pub mod raster;
pub mod validate;
pub mod vector;

pub use config::{AreaUnit, BlockConfig, NodataMode};
pub use crs::CRS;
pub use error::{Error, Result};
pub use layer::{MaskLayer, MemoryLayer, RasterProvider};
pub use raster::{Extent, GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{AreaUnit, BlockConfig, NodataMode};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::layer::{
        iter_blocks, read_window, BlockWindow, BlockWriter, LayerInfo, MaskLayer, MemoryLayer, NoProgress, Progress,
        RasterProvider, RasterWriter,
    };
    pub use crate::raster::{Extent, GeoTransform, Raster, RasterElement};
    pub use crate::vector::{PointSet, WeightedPoint};
}
