//! # lulc algorithms
//!
//! Streaming change metrics for categorical land-cover raster series.
//!
//! ## Modules
//!
//! - **change**: validity masks, max class, area by class, interval metrics,
//!   top transitions, change frequency, hotspot sampling, intensity
//! - **inspect**: class scans and AOI coverage for input validation
//!
//! Every function traverses its layers block by block through
//! [`lulc_core::RasterProvider`], so memory is bounded by the block size and
//! the accumulators, not by the raster extent.

pub mod change;
pub mod inspect;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{
        blank_density_raster, build_top_transitions, build_top_transitions_excluding, compute_area_by_class,
        compute_intensity_rows, compute_interval_metrics, compute_max_class, sample_changed_points,
        transition_table, validity_mask, write_change_frequency, AreaByClass, AreaRow, FrequencySummary,
        HotspotParams, HotspotSample, IntensityRow, IntervalChange, NetGrossRow, NodataClassPolicy,
        TopTransitionRow, TransitionTable, YearInterval, FREQUENCY_NODATA,
    };
    pub use crate::inspect::{aoi_coverage, scan_classes, AoiCoverage, ClassScan};
    pub use lulc_core::prelude::*;
}
