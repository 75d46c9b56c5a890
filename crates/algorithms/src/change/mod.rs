//! Land-use change accounting
//!
//! Streaming statistics over a time series of aligned categorical rasters:
//! - **Validity masks**: NoData and AOI aware per-block masks
//! - **Max class**: global class id bound used to size every table
//! - **Area by class**: per-layer class histogram
//! - **Interval metrics**: gain/loss, transition matrix, changed/total counts
//! - **Top transitions**: ranked off-diagonal conversions
//! - **Change frequency**: per-pixel count of changes across the series
//! - **Hotspot sampling**: bounded sample of changed-pixel centers
//! - **Intensity**: interval and annualized change rates
//!
//! Every statistic is a single sequential traversal that either completes
//! or returns an error; no partial result is ever returned.

mod area;
mod frequency;
mod hotspot;
mod intensity;
mod interval;
mod mask;
mod max_class;
mod pair;
mod transitions;

pub use area::{compute_area_by_class, AreaByClass, AreaRow};
pub use frequency::{write_change_frequency, FrequencySummary, FREQUENCY_NODATA};
pub use hotspot::{blank_density_raster, sample_changed_points, HotspotParams, HotspotSample};
pub use intensity::{compute_intensity_rows, IntensityRow, YearInterval};
pub use interval::{compute_interval_metrics, IntervalChange, NetGrossRow};
pub use mask::{conjunct, read_aoi_block, validity_mask};
pub use max_class::compute_max_class;
pub use transitions::{
    build_top_transitions, build_top_transitions_excluding, transition_table, NodataClassPolicy, TopTransitionRow,
    TransitionTable,
};

use lulc_core::raster::RasterElement;
use lulc_core::{Error, Result};

/// Largest class id accepted by any histogram
pub const MAX_CLASS_ID: usize = 65_535;

/// Largest class id accepted by the dense transition matrix
pub const MAX_TRANSITION_CLASS: usize = 4_095;

/// Interpret a valid cell value as a class id.
///
/// Class ids are finite, integral and within `0..=MAX_CLASS_ID`.
pub fn class_index<T: RasterElement>(value: T) -> Result<usize> {
    let v = value.to_f64().unwrap_or(f64::NAN);
    if !v.is_finite() || v.fract() != 0.0 || v < 0.0 || v > MAX_CLASS_ID as f64 {
        return Err(Error::InvalidClassValue { value: v });
    }
    Ok(v as usize)
}
