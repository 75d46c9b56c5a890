//! Pre-run inspection of input layers
//!
//! - **Class scan**: value range and distinct classes of a layer
//! - **AOI coverage**: share of valid pixels inside the area of interest

mod scan;

pub use scan::{aoi_coverage, scan_classes, AoiCoverage, ClassScan, MAX_DISTINCT_CLASSES};
