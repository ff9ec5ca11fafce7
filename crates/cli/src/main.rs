//! cloudmask CLI - cloud, cloud shadow, snow and water masks for satellite scenes

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cloudmask_algorithms::masking::{
    classify, max_shadow_displacement, AuxiliaryLayers, Band, Class, ClassificationStats,
    ClassifyConfig, SceneBands, SceneGeometry, TracingTelemetry, Warning,
};
use cloudmask_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use cloudmask_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cloudmask")]
#[command(author, version, about = "Cloud, cloud shadow, snow and water masking", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a scene into clear, water, snow, shadow, cloud and no-data
    Classify(ClassifyArgs),
    /// Print the default configuration as JSON
    Config,
    /// Show information about a class mask
    Info {
        /// Input mask file
        input: PathBuf,
        /// Configuration whose class codes the mask uses
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ClassifyArgs {
    /// Blue reflectance band
    #[arg(long)]
    blue: PathBuf,
    /// Green reflectance band
    #[arg(long)]
    green: PathBuf,
    /// Red reflectance band
    #[arg(long)]
    red: PathBuf,
    /// Near-infrared reflectance band
    #[arg(long)]
    nir: PathBuf,
    /// Shortwave-infrared 1 (1.6 um) reflectance band
    #[arg(long)]
    swir1: PathBuf,
    /// Shortwave-infrared 2 (2.2 um) reflectance band
    #[arg(long)]
    swir2: PathBuf,
    /// Brightness temperature band, degrees C
    #[arg(long)]
    thermal: Option<PathBuf>,
    /// Cirrus (1.38 um) reflectance band
    #[arg(long)]
    cirrus: Option<PathBuf>,
    /// Red-edge 3 reflectance band (Sentinel-2 B7)
    #[arg(long)]
    red_edge3: Option<PathBuf>,
    /// Narrow NIR reflectance band (Sentinel-2 B8A)
    #[arg(long)]
    narrow_nir: Option<PathBuf>,
    /// Per-pixel saturation flags (1 = saturated in a visible band)
    #[arg(long)]
    saturation: Option<PathBuf>,
    /// Elevation model aligned with the bands, metres
    #[arg(long)]
    dem: Option<PathBuf>,
    /// Surface water occurrence aligned with the bands, percent
    #[arg(long)]
    water_occurrence: Option<PathBuf>,

    /// Sun azimuth in degrees (0=North, clockwise)
    #[arg(long, allow_hyphen_values = true)]
    sun_azimuth: f64,
    /// Sun elevation in degrees above the horizon
    #[arg(long, allow_hyphen_values = true)]
    sun_elevation: f64,
    /// Pixel size in metres; defaults to the blue band's cell size
    #[arg(long)]
    resolution: Option<f64>,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Cloud dilation radius in pixels
    #[arg(long)]
    cloud_dilation: Option<i32>,
    /// Shadow dilation radius in pixels
    #[arg(long)]
    shadow_dilation: Option<i32>,
    /// Snow dilation radius in pixels
    #[arg(long)]
    snow_dilation: Option<i32>,

    /// Output mask file
    #[arg(short, long)]
    output: PathBuf,
    /// Also write the cloud probability layer
    #[arg(long)]
    probability: Option<PathBuf>,
    /// Write a JSON report with warnings and statistics
    #[arg(long)]
    report: Option<PathBuf>,
    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,
}

/// Contents of `--report`
#[derive(Serialize)]
struct Report<'a> {
    geometry: SceneGeometry,
    config: &'a ClassifyConfig,
    stats: &'a ClassificationStats,
    cloud_fraction: f64,
    /// Largest shadow offset searched, pixels
    max_shadow_displacement: Option<f64>,
    warnings: &'a [Warning],
    elapsed_seconds: f64,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_band(path: &Path) -> Result<Raster<f64>> {
    read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_config(args: &ClassifyArgs) -> Result<ClassifyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid configuration in {}", path.display()))?
        }
        None => ClassifyConfig::default(),
    };
    if let Some(r) = args.cloud_dilation {
        config.dilation.cloud = r;
    }
    if let Some(r) = args.shadow_dilation {
        config.dilation.shadow = r;
    }
    if let Some(r) = args.snow_dilation {
        config.dilation.snow = r;
    }
    config.emit_probability |= args.probability.is_some();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_scene(args: &ClassifyArgs) -> Result<(SceneBands, AuxiliaryLayers)> {
    let pb = spinner("Reading bands...")?;

    let mut bands = SceneBands::new();
    let required = [
        (Band::Blue, &args.blue),
        (Band::Green, &args.green),
        (Band::Red, &args.red),
        (Band::Nir, &args.nir),
        (Band::Swir1, &args.swir1),
        (Band::Swir2, &args.swir2),
    ];
    for (band, path) in required {
        bands.insert(band, read_band(path)?);
    }
    let optional = [
        (Band::Thermal, &args.thermal),
        (Band::Cirrus, &args.cirrus),
        (Band::RedEdge3, &args.red_edge3),
        (Band::NarrowNir, &args.narrow_nir),
    ];
    for (band, path) in optional.into_iter().filter_map(|(b, p)| p.as_ref().map(|p| (b, p))) {
        bands.insert(band, read_band(path)?);
    }
    if let Some(path) = &args.saturation {
        let flags: Raster<u8> =
            read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
        bands = bands.with_saturation(flags);
    }

    let mut aux = AuxiliaryLayers::new();
    if let Some(path) = &args.dem {
        aux = aux.with_elevation(read_band(path)?);
    }
    if let Some(path) = &args.water_occurrence {
        aux = aux.with_water_occurrence(read_band(path)?);
    }

    pb.finish_and_clear();
    let (rows, cols) = bands.shape()?;
    info!("Input: {} x {}, {} bands", cols, rows, bands.iter().count());
    Ok((bands, aux))
}

fn scene_geometry(args: &ClassifyArgs, bands: &SceneBands) -> Result<SceneGeometry> {
    let blue = bands.require(Band::Blue)?;
    if !blue.transform().is_north_up() {
        warn!("Bands are not north-up; shadow directions assume rows run south");
    }
    let resolution = args.resolution.unwrap_or_else(|| blue.cell_size());
    Ok(SceneGeometry::new(args.sun_azimuth, args.sun_elevation, resolution))
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_histogram(counts: &BTreeMap<String, usize>, total: usize) {
    for (name, count) in counts {
        let share = if total == 0 { 0.0 } else { 100.0 * *count as f64 / total as f64 };
        println!("  {:<8} {:>12} ({:.2}%)", name, count, share);
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_classify(args: ClassifyArgs) -> Result<()> {
    if let Some(n) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = load_config(&args)?;
    let (bands, aux) = load_scene(&args)?;
    let geometry = scene_geometry(&args, &bands)?;

    let pb = spinner("Classifying...")?;
    let start = Instant::now();
    let result = classify(&bands, &geometry, &aux, &config, &TracingTelemetry);
    pb.finish_and_clear();
    let result = result.context("Classification failed")?;
    let elapsed = start.elapsed();

    let pb = spinner("Writing output...")?;
    write_geotiff(&result.mask, &args.output, Some(GeoTiffOptions::mask()))
        .context("Failed to write mask")?;
    if let (Some(path), Some(probability)) = (&args.probability, &result.probability) {
        write_geotiff(probability, path, Some(GeoTiffOptions::default()))
            .context("Failed to write probability")?;
    }
    pb.finish_and_clear();

    if let Some(path) = &args.report {
        let report = Report {
            geometry,
            config: &config,
            stats: &result.stats,
            cloud_fraction: result.stats.cloud_fraction(),
            max_shadow_displacement: max_shadow_displacement(&geometry, &config.shadow),
            warnings: &result.warnings,
            elapsed_seconds: elapsed.as_secs_f64(),
        };
        write_json(&report, path)?;
    }

    for w in &result.warnings {
        warn!("{}", w);
    }
    let stats = &result.stats;
    println!("Mask saved to: {}", args.output.display());
    println!("  Processing time: {:.2?}", elapsed);
    println!(
        "  Cloud cover: {:.2}% of {} valid pixels",
        100.0 * stats.cloud_fraction(),
        stats.valid_pixels
    );
    println!(
        "  Cloud objects: {}, with matched shadow: {}",
        stats.cloud_objects, stats.matched_shadows
    );
    Ok(())
}

fn run_info(input: &Path, config: Option<&Path>) -> Result<()> {
    let codes = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: ClassifyConfig = serde_json::from_str(&text)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            config.codes
        }
        None => ClassifyConfig::default().codes,
    };

    let mask: Raster<u8> = read_geotiff(input).context("Failed to read mask")?;
    let (rows, cols) = mask.shape();
    let mut counts: BTreeMap<String, usize> = Class::ALL.iter().map(|c| (c.name().to_string(), 0)).collect();
    let mut unknown = 0usize;
    for &code in mask.data() {
        match codes.decode(code) {
            Some(class) => *counts.entry(class.name().to_string()).or_default() += 1,
            None => unknown += 1,
        }
    }

    println!("Mask: {}", input.display());
    println!("  Size: {} x {} ({} cells)", cols, rows, rows * cols);
    println!("  Cell size: {}", mask.cell_size());
    println!("  No-data code: {:?}", mask.nodata());
    print_histogram(&counts, rows * cols);
    if unknown > 0 {
        println!("  {} cells hold codes outside the configuration", unknown);
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Classify(args) => run_classify(args)?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&ClassifyConfig::default())?);
        }
        Commands::Info { input, config } => run_info(&input, config.as_deref())?,
    }

    Ok(())
}
