//! CSV export of finalized results

use crate::inputs::Legend;
use anyhow::{Context, Result};
use lulc_algorithms::change::{AreaRow, HotspotSample, IntensityRow, NetGrossRow, TopTransitionRow, TransitionTable};
use lulc_core::AreaUnit;
use std::fs::File;
use std::path::Path;

/// Floats are written with three decimals
fn fmt3(value: f64) -> String {
    format!("{:.3}", value)
}

fn create(path: &Path) -> Result<csv::Writer<File>> {
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn finish(mut writer: csv::Writer<File>, path: &Path) -> Result<()> {
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_area_by_class(path: &Path, rows: &[AreaRow], legend: &Legend, unit: AreaUnit) -> Result<()> {
    let area = format!("area_{}", unit.suffix());
    let mut w = create(path)?;
    w.write_record(["year", "class_id", "class_label", "pixel_count", area.as_str(), "percent_share"])?;
    for row in rows {
        w.write_record([
            row.year.to_string(),
            row.class_id.to_string(),
            legend.label(row.class_id).to_string(),
            row.pixel_count.to_string(),
            fmt3(row.area),
            fmt3(row.percent_share),
        ])?;
    }
    finish(w, path)
}

pub fn write_net_gross(path: &Path, rows: &[NetGrossRow], legend: &Legend, unit: AreaUnit) -> Result<()> {
    let net = format!("area_{}_net", unit.suffix());
    let gross = format!("area_{}_gross", unit.suffix());
    let mut w = create(path)?;
    w.write_record([
        "class_id",
        "class_label",
        "gain_pixels",
        "loss_pixels",
        "net_pixels",
        "gross_pixels",
        net.as_str(),
        gross.as_str(),
    ])?;
    for row in rows {
        w.write_record([
            row.class_id.to_string(),
            legend.label(row.class_id).to_string(),
            row.gain_pixels.to_string(),
            row.loss_pixels.to_string(),
            row.net_pixels.to_string(),
            row.gross_pixels.to_string(),
            fmt3(row.net_area),
            fmt3(row.gross_area),
        ])?;
    }
    finish(w, path)
}

pub fn write_transition_matrix(path: &Path, table: &TransitionTable, legend: &Legend) -> Result<()> {
    let mut w = create(path)?;

    let mut header = vec!["from_class".to_string(), "from_label".to_string()];
    header.extend(
        table
            .classes
            .iter()
            .map(|&c| format!("{} {}", c, legend.label(c)).trim().to_string()),
    );
    w.write_record(&header)?;

    for (i, &from) in table.classes.iter().enumerate() {
        let mut record = vec![from.to_string(), legend.label(from).to_string()];
        record.extend(table.counts.row(i).iter().map(u64::to_string));
        w.write_record(&record)?;
    }
    finish(w, path)
}

pub fn write_top_transitions(path: &Path, rows: &[TopTransitionRow], legend: &Legend, unit: AreaUnit) -> Result<()> {
    let area = format!("area_{}", unit.suffix());
    let mut w = create(path)?;
    w.write_record([
        "from_class",
        "from_label",
        "to_class",
        "to_label",
        "pixel_count",
        area.as_str(),
        "percent_of_total_change",
    ])?;
    for row in rows {
        w.write_record([
            row.from_class.to_string(),
            legend.label(row.from_class).to_string(),
            row.to_class.to_string(),
            legend.label(row.to_class).to_string(),
            row.pixel_count.to_string(),
            fmt3(row.area),
            fmt3(row.percent_of_change),
        ])?;
    }
    finish(w, path)
}

pub fn write_intensity(path: &Path, rows: &[IntensityRow]) -> Result<()> {
    let mut w = create(path)?;
    w.write_record([
        "year0",
        "year1",
        "interval_years",
        "changed_pixels",
        "total_pixels",
        "interval_intensity",
        "annualized_intensity",
    ])?;
    for row in rows {
        w.write_record([
            row.start_year.to_string(),
            row.end_year.to_string(),
            row.interval_years.to_string(),
            row.changed_pixels.to_string(),
            row.total_pixels.to_string(),
            fmt3(row.interval_intensity),
            fmt3(row.annualized_intensity),
        ])?;
    }
    finish(w, path)
}

/// Changed-pixel centers for an external density estimator
pub fn write_change_points(path: &Path, sample: &HotspotSample) -> Result<()> {
    let mut w = create(path)?;
    w.write_record(["x", "y", "weight"])?;
    for p in sample.points.iter() {
        w.write_record([fmt3(p.x()), fmt3(p.y()), p.weight.to_string()])?;
    }
    finish(w, path)
}
