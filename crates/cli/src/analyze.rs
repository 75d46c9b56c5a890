//! The `analyze` subcommand: every change statistic over a year series

use crate::export;
use crate::inputs::{Legend, Series};
use crate::report::{self, Status};
use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use lulc_algorithms::change::{
    build_top_transitions_excluding, compute_area_by_class, compute_intensity_rows, compute_interval_metrics,
    compute_max_class, sample_changed_points, transition_table, FrequencySummary, HotspotParams, IntervalChange,
    NodataClassPolicy, YearInterval,
};
use lulc_core::config::DEFAULT_BLOCK_SIZE;
use lulc_core::layer::{MaskLayer, Progress, RasterProvider};
use lulc_core::{AreaUnit, BlockConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Categorical land-cover rasters, one per date
    #[arg(required = true, num_args = 2..)]
    pub inputs: Vec<PathBuf>,

    /// Year of each input, in input order (default: read from file names)
    #[arg(short, long, value_delimiter = ',')]
    pub years: Option<Vec<i32>>,

    /// Output directory
    #[arg(short, long, default_value = "lulc_output")]
    pub output_dir: PathBuf,

    /// AOI mask raster on the same grid (1 = inside)
    #[arg(long)]
    pub aoi: Option<PathBuf>,

    /// NoData value applied to every layer instead of the declared ones
    #[arg(long)]
    pub nodata: Option<String>,

    /// Class labels as id=label pairs, e.g. "1=Forest,2=Cropland"
    #[arg(long)]
    pub legend: Option<String>,

    /// Keep a shared integral NoData value as a class in transition tables
    #[arg(long)]
    pub include_nodata_class: bool,

    /// Area unit: m2, ha, km2
    #[arg(short, long, default_value = "km2")]
    pub unit: String,

    /// Block edge in pixels
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Maximum number of change points exported per interval
    #[arg(long, default_value_t = HotspotParams::default().max_points)]
    pub max_points: usize,

    /// Seed for change point subsampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip area_by_class.csv
    #[arg(long)]
    pub no_area: bool,

    /// Skip the net/gross change tables
    #[arg(long)]
    pub no_net_gross: bool,

    /// Skip the transition matrices
    #[arg(long)]
    pub no_matrix: bool,

    /// Skip the top transition tables
    #[arg(long)]
    pub no_top: bool,

    /// Skip change_intensity.csv
    #[arg(long)]
    pub no_intensity: bool,

    /// Skip change_frequency.tif
    #[arg(long)]
    pub no_frequency: bool,

    /// Skip the change point exports
    #[arg(long)]
    pub no_hotspot: bool,
}

/// Which products a run writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outputs {
    pub area: bool,
    pub net_gross: bool,
    pub matrix: bool,
    pub top: bool,
    pub intensity: bool,
    pub frequency: bool,
    pub hotspot: bool,
}

impl Outputs {
    pub fn from_args(args: &AnalyzeArgs) -> Self {
        Self {
            area: !args.no_area,
            net_gross: !args.no_net_gross,
            matrix: !args.no_matrix,
            top: !args.no_top,
            intensity: !args.no_intensity,
            frequency: !args.no_frequency,
            hotspot: !args.no_hotspot,
        }
    }

    fn needs_intervals(&self) -> bool {
        self.net_gross || self.matrix || self.top || self.intensity
    }

    /// Full-grid traversals of the run: validation scans, AOI coverage,
    /// max class, then one per enabled statistic.
    pub fn passes(&self, layers: usize, with_aoi: bool) -> usize {
        let intervals = layers.saturating_sub(1);
        let mut passes = layers + usize::from(with_aoi) + layers;
        if self.area {
            passes += layers;
        }
        if self.needs_intervals() {
            passes += intervals;
        }
        if self.frequency {
            passes += 1;
        }
        if self.hotspot {
            passes += intervals;
        }
        passes
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let outputs = Outputs::from_args(&args);
    let unit: AreaUnit = args.unit.parse()?;
    let legend = match &args.legend {
        Some(text) => Legend::parse(text)?,
        None => Legend::default(),
    };
    let config = BlockConfig::square(args.block_size);
    config.validate()?;

    let series = Series::open(
        &args.inputs,
        args.years.as_deref(),
        args.nodata.as_deref(),
        args.aoi.as_deref(),
    )?;
    if series.layers.len() < 2 {
        bail!("At least two rasters are needed to measure change");
    }
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let first = series.first();
    let blocks = config.block_count(first.width(), first.height());
    let total = blocks * outputs.passes(series.layers.len(), series.aoi.is_some());
    debug!("{} blocks per layer, {} blocks in total", blocks, total);

    let pb = progress_bar(total.max(1) as u64);
    let mut tick = || -> lulc_core::Result<()> {
        pb.inc(1);
        Ok(())
    };

    let validation = report::validate_series(&series, &config, &mut tick)?;
    pb.suspend(|| validation.log());
    if validation.has_failures() {
        pb.abandon();
        bail!("Input validation failed");
    }
    if validation.checks.iter().any(|c| c.status == Status::Warn) {
        warn!("Continuing despite validation warnings");
    }

    let layers = series.layer_refs();
    let aoi = series.aoi();
    let max_class = compute_max_class(&layers, &series.nodata, aoi, &config, &mut tick)?;
    pb.suspend(|| info!("Max class id: {}", max_class));

    let cell_area = unit.cell_area(first.transform().pixel_area());
    let out = |name: String| args.output_dir.join(name);

    if outputs.area {
        let mut rows = Vec::new();
        for (input, (layer, &nodata)) in series.inputs.iter().zip(layers.iter().zip(&series.nodata)) {
            let area = compute_area_by_class(*layer, nodata, aoi, &config, &mut tick)?;
            rows.extend(area.rows(input.year, cell_area));
        }
        export::write_area_by_class(&out("area_by_class.csv".into()), &rows, &legend, unit)?;
        pb.suspend(|| info!("Wrote area_by_class.csv"));
    }

    let intervals: Vec<YearInterval> = series
        .inputs
        .windows(2)
        .map(|pair| YearInterval::new(pair[0].year, pair[1].year))
        .collect();

    let mut results: Vec<IntervalChange> = Vec::with_capacity(intervals.len());
    if outputs.needs_intervals() {
        for i in 0..intervals.len() {
            let result = compute_interval_metrics(
                layers[i],
                layers[i + 1],
                series.nodata[i],
                series.nodata[i + 1],
                aoi,
                max_class,
                &config,
                &mut tick,
            )?;
            debug!(
                "{}-{}: {} of {} valid pixels changed ({:.2}%)",
                intervals[i].start,
                intervals[i].end,
                result.changed_pixels,
                result.total_valid_pixels,
                result.percent_changed()
            );
            results.push(result);
        }
    }

    for (i, (years, result)) in intervals.iter().zip(&results).enumerate() {
        let suffix = format!("{}_{}", years.start, years.end);
        let policy = NodataClassPolicy::resolve(series.nodata[i], series.nodata[i + 1], args.include_nodata_class);

        if outputs.net_gross {
            let name = format!("net_gross_change_{}.csv", suffix);
            export::write_net_gross(&out(name.clone()), &result.net_gross(cell_area), &legend, unit)?;
            pb.suspend(|| info!("Wrote {}", name));
        }
        if outputs.matrix {
            let name = format!("transition_matrix_{}.csv", suffix);
            export::write_transition_matrix(&out(name.clone()), &transition_table(&result.matrix, policy), &legend)?;
            pb.suspend(|| info!("Wrote {}", name));
        }
        if outputs.top {
            let name = format!("top_transitions_{}.csv", suffix);
            let rows = build_top_transitions_excluding(&result.matrix, cell_area, policy.excluded);
            export::write_top_transitions(&out(name.clone()), &rows, &legend, unit)?;
            pb.suspend(|| info!("Wrote {}", name));
        }
    }

    if outputs.frequency {
        let path = out("change_frequency.tif".into());
        let summary = write_frequency(&path, &layers, &series.nodata, aoi, &config, &mut tick)?;
        pb.suspend(|| {
            info!(
                "Wrote change_frequency.tif ({} of {} valid cells changed)",
                summary.changed_cells(),
                summary.valid_cells()
            )
        });
    }

    if outputs.intensity {
        let rows = compute_intensity_rows(intervals.iter().copied().zip(&results));
        export::write_intensity(&out("change_intensity.csv".into()), &rows)?;
        pb.suspend(|| info!("Wrote change_intensity.csv"));
    }

    if outputs.hotspot {
        let params = HotspotParams {
            max_points: args.max_points,
            seed: args.seed,
        };
        for (i, years) in intervals.iter().enumerate() {
            let sample = sample_changed_points(
                layers[i],
                layers[i + 1],
                series.nodata[i],
                series.nodata[i + 1],
                aoi,
                &params,
                &config,
                &mut tick,
            )?;

            let name = if sample.points.is_empty() {
                let name = format!("change_hotspot_{}_{}.tif", years.start, years.end);
                write_blank_hotspot(&out(name.clone()), first)?;
                name
            } else {
                let name = format!("change_points_{}_{}.csv", years.start, years.end);
                export::write_change_points(&out(name.clone()), &sample)?;
                name
            };
            pb.suspend(|| info!("Wrote {}", name));
        }
    }

    pb.finish_and_clear();
    Ok(())
}

#[cfg(not(feature = "gdal"))]
fn write_frequency(
    path: &Path,
    layers: &[&dyn RasterProvider<Cell = f64>],
    nodata: &[Option<f64>],
    aoi: Option<MaskLayer<'_>>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<FrequencySummary> {
    use lulc_algorithms::change::{write_change_frequency, FREQUENCY_NODATA};
    use lulc_core::io::{stream_geotiff, GeoTiffOptions, SampleType};

    let summary = stream_geotiff::<i16, _, _, _, _>(
        path,
        layers[0],
        Some(FREQUENCY_NODATA as f64),
        GeoTiffOptions::with_sample_type(SampleType::Int16),
        config.block_rows,
        |writer| write_change_frequency(layers, nodata, aoi, writer, config, progress),
    )
    .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(summary)
}

#[cfg(feature = "gdal")]
fn write_frequency(
    path: &Path,
    layers: &[&dyn RasterProvider<Cell = f64>],
    nodata: &[Option<f64>],
    aoi: Option<MaskLayer<'_>>,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<FrequencySummary> {
    use lulc_algorithms::change::{write_change_frequency, FREQUENCY_NODATA};
    use lulc_core::io::GdalBlockWriter;

    let mut writer = GdalBlockWriter::<i16>::create(path, layers[0], Some(FREQUENCY_NODATA as f64))
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(write_change_frequency(layers, nodata, aoi, &mut writer, config, progress)?)
}

/// All-zero density surface for an interval without change
fn write_blank_hotspot(path: &Path, like: &dyn RasterProvider<Cell = f64>) -> Result<()> {
    use lulc_algorithms::change::blank_density_raster;
    use lulc_core::io::{write_geotiff, GeoTiffOptions, SampleType};

    write_geotiff(
        &blank_density_raster(like),
        path,
        Some(GeoTiffOptions::with_sample_type(SampleType::Float32)),
    )
    .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lulc_core::io::{read_geotiff, write_geotiff, GeoTiffOptions, SampleType};
    use lulc_core::{GeoTransform, MemoryLayer, CRS};
    use tempfile::{tempdir, TempDir};

    fn write_layer(dir: &TempDir, name: &str, rows: Vec<Vec<u8>>) -> PathBuf {
        let layer = MemoryLayer::from_rows(rows, GeoTransform::new(500_000.0, 4_000.0, 1_000.0, -1_000.0))
            .unwrap()
            .with_crs(Some(CRS::from_epsg(32719)))
            .with_nodata(Some(255.0));
        let path = dir.path().join(name);
        write_geotiff(layer.raster(), &path, Some(GeoTiffOptions::with_sample_type(SampleType::Byte))).unwrap();
        path
    }

    fn args(inputs: Vec<PathBuf>, output_dir: PathBuf) -> AnalyzeArgs {
        AnalyzeArgs {
            inputs,
            years: None,
            output_dir,
            aoi: None,
            nodata: None,
            legend: Some("0=Water,1=Forest,2=Crop".into()),
            include_nodata_class: false,
            unit: "km2".into(),
            block_size: 3,
            max_points: 100,
            seed: Some(1),
            no_area: false,
            no_net_gross: false,
            no_matrix: false,
            no_top: false,
            no_intensity: false,
            no_frequency: false,
            no_hotspot: false,
        }
    }

    fn all_outputs() -> Outputs {
        Outputs {
            area: true,
            net_gross: true,
            matrix: true,
            top: true,
            intensity: true,
            frequency: true,
            hotspot: true,
        }
    }

    #[test]
    fn test_pass_budget() {
        // 3 scans + AOI + 3 max class + 3 area + 2 intervals + frequency + 2 hotspot
        assert_eq!(all_outputs().passes(3, true), 15);

        let only_frequency = Outputs {
            area: false,
            net_gross: false,
            matrix: false,
            top: false,
            intensity: false,
            hotspot: false,
            ..all_outputs()
        };
        assert_eq!(only_frequency.passes(2, false), 5);
    }

    #[test]
    fn test_run_writes_every_output() {
        let dir = tempdir().unwrap();
        let later = write_layer(
            &dir,
            "lc_2010.tif",
            vec![vec![1, 2, 2, 2], vec![1, 1, 2, 0], vec![0, 2, 1, 1], vec![0, 0, 2, 1]],
        );
        let earlier = write_layer(
            &dir,
            "lc_2000.tif",
            vec![vec![1, 1, 2, 2], vec![1, 1, 2, 2], vec![0, 0, 1, 1], vec![0, 0, 1, 1]],
        );
        let out = dir.path().join("out");

        run(args(vec![later, earlier], out.clone())).unwrap();

        for name in [
            "area_by_class.csv",
            "net_gross_change_2000_2010.csv",
            "transition_matrix_2000_2010.csv",
            "top_transitions_2000_2010.csv",
            "change_intensity.csv",
            "change_frequency.tif",
            "change_points_2000_2010.csv",
        ] {
            assert!(out.join(name).exists(), "missing {}", name);
        }

        let intensity = std::fs::read_to_string(out.join("change_intensity.csv")).unwrap();
        assert_eq!(intensity.lines().nth(1), Some("2000,2010,10,4,16,0.250,0.025"));

        let matrix = std::fs::read_to_string(out.join("transition_matrix_2000_2010.csv")).unwrap();
        assert_eq!(matrix.lines().next(), Some("from_class,from_label,0 Water,1 Forest,2 Crop"));
        assert_eq!(matrix.lines().nth(2), Some("1,Forest,0,6,2"));

        let points = std::fs::read_to_string(out.join("change_points_2000_2010.csv")).unwrap();
        assert_eq!(points.lines().count(), 5);
    }

    #[test]
    fn test_declared_nodata_is_excluded() {
        let dir = tempdir().unwrap();
        let a = write_layer(&dir, "lc_2000.tif", vec![vec![1, 1], vec![2, 255]]);
        let b = write_layer(&dir, "lc_2010.tif", vec![vec![1, 2], vec![2, 255]]);
        let out = dir.path().join("out");

        run(args(vec![a, b], out.clone())).unwrap();

        let area = std::fs::read_to_string(out.join("area_by_class.csv")).unwrap();
        assert_eq!(area.lines().count(), 5);
        assert!(area.contains("2000,1,Forest,2,2.000,66.667"));
        assert!(area.contains("2010,2,Crop,2,2.000,66.667"));
        assert!(!area.contains(",255,"));

        let intensity = std::fs::read_to_string(out.join("change_intensity.csv")).unwrap();
        assert_eq!(intensity.lines().nth(1), Some("2000,2010,10,1,3,0.333,0.033"));

        let frequency: lulc_core::Raster<i16> = read_geotiff(out.join("change_frequency.tif")).unwrap();
        assert_eq!(frequency.nodata(), Some(-1.0));
        assert_eq!(frequency.data()[[0, 1]], 1);
        assert_eq!(frequency.data()[[1, 1]], -1);
        assert_eq!(frequency.transform().pixel_width, 1_000.0);
    }

    #[test]
    fn test_unchanged_series_gets_blank_hotspot() {
        let dir = tempdir().unwrap();
        let rows = vec![vec![1, 2], vec![2, 1]];
        let a = write_layer(&dir, "a_1990.tif", rows.clone());
        let b = write_layer(&dir, "b_1995.tif", rows);
        let out = dir.path().join("out");

        let mut only_hotspot = args(vec![a, b], out.clone());
        only_hotspot.no_area = true;
        only_hotspot.no_frequency = true;
        run(only_hotspot).unwrap();

        assert!(out.join("change_hotspot_1990_1995.tif").exists());
        assert!(!out.join("change_points_1990_1995.csv").exists());
        assert!(!out.join("area_by_class.csv").exists());
        assert!(out.join("net_gross_change_1990_1995.csv").exists());
    }
}
