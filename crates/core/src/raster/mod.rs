//! Raster data structures and georeferencing

mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::{Extent, GeoTransform};
pub use grid::Raster;
