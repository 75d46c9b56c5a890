//! Error types for land-use change accounting

use thiserror::Error;

/// Main error type for lulc operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The raster provider could not decode a requested block.
    #[error("Cannot read block at ({col}, {row}) size {cols}x{rows}: {reason}")]
    LayerRead {
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
        reason: String,
    },

    /// A cell value cannot index a bounded class histogram.
    #[error("Invalid class value: {value}")]
    InvalidClassValue { value: f64 },

    /// Input layers do not share grid, CRS, extent or resolution.
    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// A progress observer asked the traversal to stop between blocks.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for lulc operations
pub type Result<T> = std::result::Result<T, Error>;
