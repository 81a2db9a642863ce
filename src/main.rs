use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sketch2stl::config::{self, FileConfig, thickness_for_path};
use sketch2stl::mesh::stl::estimate_stl_size;
use sketch2stl::raster::is_supported;
use sketch2stl::{Pipeline, PipelineSummary};

/// Turn 2D jewelry sketches into 3D-printable STL solids
///
/// Examples:
///   # Convert one sketch; thickness comes from the name ("pendant" -> 1.5mm)
///   sketch2stl pendant_leaf.png
///
///   # Explicit thickness and output path
///   sketch2stl ring.jpg -t 2.5 -o out/ring.stl
///
///   # Convert every sketch in a folder into another folder
///   sketch2stl sketches/ -o stl/
///
///   # Machine-readable summary
///   sketch2stl sketches/ --json
#[derive(Parser, Debug)]
#[command(name = "sketch2stl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Sketch image, or a directory of sketches
    input: PathBuf,

    /// Output STL file, or output directory when INPUT is a directory
    /// (defaults to the input path with an .stl extension)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Extrusion thickness in mm (defaults to the jewelry preset for the
    /// file name, then the config file)
    #[arg(short = 't', long)]
    thickness: Option<f64>,

    /// Path to config file (optional, auto-searches sketch2stl.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Discard contours whose perimeter is at or below this many pixels
    #[arg(long)]
    min_contour_length: Option<f64>,

    /// Contour simplification tolerance as a fraction of the perimeter
    #[arg(long)]
    epsilon_factor: Option<f64>,

    /// Treat light strokes on a dark background as the shape
    #[arg(long)]
    no_invert: bool,

    /// Print a JSON summary instead of the human-readable report
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Serialize)]
struct ItemReport {
    input: PathBuf,
    output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PipelineSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config: Option<FileConfig> = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            Some(toml::from_str(&contents).context("Failed to parse config file")?)
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load()
    };

    let verbose = if file_config.as_ref().map(|c| c.verbose).unwrap_or(false) {
        args.verbose.max(1)
    } else {
        args.verbose
    };
    init_tracing(verbose);

    let mut pipeline_config = file_config
        .as_ref()
        .map(|c| c.pipeline_config())
        .unwrap_or_default();
    if let Some(length) = args.min_contour_length {
        pipeline_config.contour.min_contour_length = length;
    }
    if let Some(factor) = args.epsilon_factor {
        pipeline_config.contour.epsilon_factor = factor;
    }
    if args.no_invert {
        pipeline_config.preprocess.invert = false;
    }
    let default_thickness = file_config
        .as_ref()
        .map(|c| c.thickness)
        .unwrap_or(config::thickness::DEFAULT);
    let output = args
        .output
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.output.clone()));

    let jobs = collect_jobs(&args.input, output.as_deref())?;
    if jobs.is_empty() {
        bail!("No supported images found in {}", args.input.display());
    }

    let pipeline = Pipeline::new(pipeline_config);
    let mut reports = Vec::with_capacity(jobs.len());

    for (input, output) in jobs {
        let thickness = args
            .thickness
            .unwrap_or_else(|| thickness_for_path(&input, default_thickness));
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        let spinner = create_spinner(&format!("Processing {} ({:.1}mm)...", name, thickness), args.json);
        let start = Instant::now();

        let report = match pipeline.process_file(&input, &output, thickness) {
            Ok(result) => {
                let summary = result.summary();
                let status = if summary.is_valid { "PASS" } else { "FAIL" };
                spinner.finish_with_message(format!(
                    "{} {} -> {} ({} triangles, {:.1} KB) [{:.1}s]",
                    status,
                    name,
                    output.display(),
                    summary.faces,
                    estimate_stl_size(summary.faces) as f64 / 1024.0,
                    start.elapsed().as_secs_f32()
                ));
                if !args.json {
                    print_details(&summary);
                }
                ItemReport {
                    input,
                    output,
                    summary: Some(summary),
                    error: None,
                }
            }
            Err(e) => {
                spinner.finish_with_message(format!("FAIL {}: {:#}", name, e));
                ItemReport {
                    input,
                    output,
                    summary: None,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        reports.push(report);
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!();
        println!(
            "Done! {} of {} sketches exported. Total time: {:.1}s",
            reports.len() - failed,
            reports.len(),
            total_start.elapsed().as_secs_f32()
        );
    }

    if failed > 0 {
        bail!("{} of {} sketches failed", failed, reports.len());
    }
    Ok(())
}

/// Pair every input image with its STL destination.
fn collect_jobs(input: &Path, output: Option<&Path>) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !input.is_dir() {
        let out = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.with_extension("stl"));
        return Ok(vec![(input.to_path_buf(), out)]);
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("Failed to read directory: {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    images.sort();

    Ok(images
        .into_iter()
        .map(|image| {
            let out = match (output, image.file_stem()) {
                (Some(dir), Some(stem)) => dir.join(format!("{}.stl", stem.to_string_lossy())),
                _ => image.with_extension("stl"),
            };
            (image, out)
        })
        .collect())
}

fn print_details(summary: &PipelineSummary) {
    println!(
        "  {} contours, {} polygons, strategy: {}",
        summary.contours,
        summary.polygons,
        summary
            .strategy
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "none".to_string())
    );
    if let Some([x, y, z]) = summary.dimensions {
        println!("  Size: {:.1} x {:.1} x {:.1}", x, y, z);
    }
    if summary.repaired {
        println!("  Mesh was repaired");
    }
    for issue in &summary.issues {
        println!("  Issue: {}", issue);
    }
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over -v
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "sketch2stl=info",
            2 => "sketch2stl=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn create_spinner(message: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
