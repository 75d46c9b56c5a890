//! Run configuration shared by the engine and its callers

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default block edge, in pixels
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Block geometry used for every traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockConfig {
    pub block_cols: usize,
    pub block_rows: usize,
}

impl BlockConfig {
    /// Square blocks of `size` pixels
    pub fn square(size: usize) -> Self {
        Self {
            block_cols: size,
            block_rows: size,
        }
    }

    /// Number of blocks needed to cover a `width` x `height` grid
    pub fn block_count(&self, width: usize, height: usize) -> usize {
        width.div_ceil(self.block_cols.max(1)) * height.div_ceil(self.block_rows.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_cols == 0 || self.block_rows == 0 {
            return Err(Error::InvalidParameter {
                name: "block_size",
                value: format!("{}x{}", self.block_cols, self.block_rows),
                reason: "block dimensions must be > 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self::square(DEFAULT_BLOCK_SIZE)
    }
}

/// Where the NoData sentinel of each layer comes from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum NodataMode {
    /// Use the value declared by each raster, if any
    #[default]
    FromRaster,
    /// Use the same value for every layer
    Override(f64),
}

impl NodataMode {
    /// Resolve the sentinel for a layer declaring `declared`
    pub fn resolve(&self, declared: Option<f64>) -> Option<f64> {
        match self {
            NodataMode::FromRaster => declared,
            NodataMode::Override(v) => Some(*v),
        }
    }
}

/// Parse a user supplied NoData override.
pub fn parse_nodata_override(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Configuration("NoData value is required".into()));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| Error::Configuration(format!("NoData value is not numeric: '{}'", trimmed)))?;
    if value.is_nan() {
        return Err(Error::Configuration("NoData value cannot be NaN".into()));
    }
    Ok(value)
}

/// Unit for reported areas, assuming map units of metres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    /// Squared map units, no conversion
    MapUnits,
    Hectares,
    #[default]
    SquareKilometers,
}

impl AreaUnit {
    /// Multiplier from squared map units to this unit
    pub fn factor(&self) -> f64 {
        match self {
            AreaUnit::MapUnits => 1.0,
            AreaUnit::Hectares => 1e-4,
            AreaUnit::SquareKilometers => 1e-6,
        }
    }

    /// Column suffix used by exporters
    pub fn suffix(&self) -> &'static str {
        match self {
            AreaUnit::MapUnits => "units2",
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareKilometers => "km2",
        }
    }

    /// Area of one cell in this unit
    pub fn cell_area(&self, pixel_area_map_units: f64) -> f64 {
        pixel_area_map_units.abs() * self.factor()
    }
}

impl std::str::FromStr for AreaUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "units" | "map" | "m2" => Ok(AreaUnit::MapUnits),
            "ha" | "hectares" => Ok(AreaUnit::Hectares),
            "km2" | "km" => Ok(AreaUnit::SquareKilometers),
            _ => Err(Error::Configuration(format!(
                "Unknown area unit: {}. Use m2, ha or km2.",
                s
            ))),
        }
    }
}
