//! Pre-run validation report

use crate::inputs::Series;
use anyhow::Result;
use lulc_algorithms::inspect::{aoi_coverage, scan_classes, AoiCoverage, ClassScan};
use lulc_core::layer::{LayerInfo, Progress};
use lulc_core::validate::{validate_alignment, NodataCheck};
use lulc_core::BlockConfig;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Warn,
    Fail,
    Info,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pass => "PASS",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
            Status::Info => "INFO",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
}

impl ValidationReport {
    pub fn has_failures(&self) -> bool {
        self.checks.iter().any(|c| c.status == Status::Fail)
    }

    /// Emit every check at a level matching its status
    pub fn log(&self) {
        for c in &self.checks {
            match c.status {
                Status::Fail => error!("{:<15} {}  {}", c.name, c.status, c.detail),
                Status::Warn => warn!("{:<15} {}  {}", c.name, c.status, c.detail),
                Status::Pass | Status::Info => info!("{:<15} {}  {}", c.name, c.status, c.detail),
            }
        }
    }
}

pub fn alignment_check(infos: &[LayerInfo]) -> Check {
    let (status, detail) = match validate_alignment(infos) {
        Ok(()) => {
            let base = &infos[0];
            let (px, py) = base.transform.pixel_size();
            let crs = base.crs.as_ref().map_or_else(|| "no CRS".to_string(), |c| c.to_string());
            (Status::Pass, format!("{}, {}x{} cells of {} x {}", crs, base.width, base.height, px, py))
        }
        Err(e) => (Status::Fail, e.to_string()),
    };
    Check {
        name: "Alignment",
        status,
        detail,
    }
}

pub fn nodata_check(check: &NodataCheck) -> Check {
    let (status, detail) = match check {
        NodataCheck::Override(v) => (Status::Info, format!("Override: {}", v)),
        NodataCheck::Consistent(v) => (Status::Pass, format!("Value: {}", v)),
        NodataCheck::Absent => (Status::Info, "No layer declares NoData".to_string()),
        NodataCheck::Missing(names) => (Status::Warn, format!("Missing for: {}", names.join(", "))),
        NodataCheck::Inconsistent(values) => {
            let values: Vec<String> = values.iter().map(f64::to_string).collect();
            (Status::Warn, format!("Inconsistent values: {}", values.join(", ")))
        }
    };
    Check {
        name: "NoData",
        status,
        detail,
    }
}

/// Value range, class count and integrality of each scanned layer
pub fn scan_checks(names: &[&str], scans: &[ClassScan]) -> Vec<Check> {
    let fmt_bound = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    let ranges: Vec<String> = names
        .iter()
        .zip(scans)
        .map(|(n, s)| format!("{}: {}..{}", n, fmt_bound(s.min), fmt_bound(s.max)))
        .collect();
    let classes: Vec<String> = names
        .iter()
        .zip(scans)
        .map(|(n, s)| format!("{}: {}", n, s.distinct_label()))
        .collect();
    let fractional: Vec<&str> = names
        .iter()
        .zip(scans)
        .filter(|(_, s)| !s.integral_values)
        .map(|(n, _)| *n)
        .collect();

    let values = if fractional.is_empty() {
        Check {
            name: "Class values",
            status: Status::Pass,
            detail: "All valid values are whole numbers".into(),
        }
    } else {
        Check {
            name: "Class values",
            status: Status::Warn,
            detail: format!("Fractional values in: {}", fractional.join(", ")),
        }
    };

    vec![
        Check {
            name: "Value range",
            status: Status::Info,
            detail: ranges.join("; "),
        },
        Check {
            name: "Unique classes",
            status: Status::Info,
            detail: classes.join("; "),
        },
        values,
    ]
}

pub fn coverage_check(coverage: Option<AoiCoverage>) -> Check {
    let detail = match coverage {
        Some(c) => format!("{:.2}% of valid pixels", c.percent()),
        None => "No AOI selected".to_string(),
    };
    Check {
        name: "AOI coverage",
        status: Status::Info,
        detail,
    }
}

/// Run every check against an opened series.
///
/// Scans and coverage are skipped when the grids do not line up.
pub fn validate_series(series: &Series, config: &BlockConfig, progress: &mut dyn Progress) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let alignment = alignment_check(&series.alignment_infos());
    let aligned = alignment.status == Status::Pass;
    report.checks.push(alignment);
    report.checks.push(nodata_check(&series.nodata_check()));

    if !aligned {
        return Ok(report);
    }

    let mut scans = Vec::with_capacity(series.layers.len());
    for (layer, &nodata) in series.layer_refs().into_iter().zip(&series.nodata) {
        scans.push(scan_classes(layer, nodata, config, progress)?);
    }
    let names: Vec<&str> = series.inputs.iter().map(|i| i.name.as_str()).collect();
    report.checks.extend(scan_checks(&names, &scans));

    let coverage = match series.aoi() {
        Some(aoi) => Some(aoi_coverage(series.first(), series.nodata[0], aoi, config, progress)?),
        None => None,
    };
    report.checks.push(coverage_check(coverage));

    Ok(report)
}
