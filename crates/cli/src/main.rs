//! lulc CLI - Land-use/land-cover change accounting

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lulc_algorithms::inspect::scan_classes;
use lulc_core::config::DEFAULT_BLOCK_SIZE;
use lulc_core::layer::NoProgress;
use lulc_core::BlockConfig;

mod analyze;
mod export;
mod inputs;
mod report;

use analyze::AnalyzeArgs;
use inputs::{open_class_layer, Series};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lulc")]
#[command(author, version, about = "Land-use/land-cover change accounting", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a class raster
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Check that a series can be analysed together
    Validate {
        /// Categorical land-cover rasters, one per date
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Year of each input, in input order
        #[arg(short, long, value_delimiter = ',')]
        years: Option<Vec<i32>>,
        /// AOI mask raster on the same grid
        #[arg(long)]
        aoi: Option<PathBuf>,
        /// NoData value applied to every layer
        #[arg(long)]
        nodata: Option<String>,
        /// Block edge in pixels
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
    },
    /// Compute area, transition, frequency, intensity and hotspot outputs
    Analyze(AnalyzeArgs),
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_info(input: &Path) -> Result<()> {
    let layer = open_class_layer(input)?;
    let (width, height) = (layer.width(), layer.height());
    let gt = layer.transform();
    let extent = layer.extent();

    let pb = spinner("Scanning classes");
    let scan = scan_classes(&*layer, layer.nodata(), &BlockConfig::default(), &mut NoProgress)?;
    pb.finish_and_clear();

    let cells = (width * height) as u64;
    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", width, height, cells);
    println!("Pixel size: {} x {}", gt.pixel_width, gt.pixel_height);
    println!(
        "Extent: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    if let Some(crs) = layer.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = layer.nodata() {
        println!("NoData: {}", nodata);
    }

    println!("\nClasses:");
    if let Some(min) = scan.min {
        println!("  Min: {}", min);
    }
    if let Some(max) = scan.max {
        println!("  Max: {}", max);
    }
    println!("  Distinct values: {}", scan.distinct_label());
    if !scan.capped && !scan.distinct.is_empty() {
        let ids: Vec<String> = scan.distinct.iter().map(i64::to_string).collect();
        println!("  Ids: {}", ids.join(", "));
    }
    if !scan.integral_values {
        println!("  Warning: fractional values present");
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        scan.valid_pixels,
        if cells == 0 { 0.0 } else { 100.0 * scan.valid_pixels as f64 / cells as f64 }
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => print_info(&input)?,

        Commands::Validate {
            inputs,
            years,
            aoi,
            nodata,
            block_size,
        } => {
            let config = BlockConfig::square(block_size);
            config.validate()?;
            let series = Series::open(&inputs, years.as_deref(), nodata.as_deref(), aoi.as_deref())?;

            let pb = spinner("Validating inputs");
            let report = report::validate_series(&series, &config, &mut NoProgress)?;
            pb.finish_and_clear();

            for check in &report.checks {
                println!("{:<15} {:<5} {}", check.name, check.status, check.detail);
            }
            if report.has_failures() {
                anyhow::bail!("Input validation failed");
            }
        }

        Commands::Analyze(args) => {
            let output_dir = args.output_dir.clone();
            info!("Analyzing {} rasters", args.inputs.len());
            let start = Instant::now();
            analyze::run(args)?;
            done("Change accounting", &output_dir, start.elapsed());
        }
    }

    Ok(())
}
