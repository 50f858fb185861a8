use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use image::{DynamicImage, ImageReader};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use leeway::batch::{BatchItem, BatchOutcome, BatchRunner};
use leeway::{
    AnalysisConfig, AnalysisError, AnalysisResult, Analyzer, Calibration, ImageType, QualityMode,
    StageRecorder,
};

#[derive(Parser)]
#[command(name = "leeway")]
#[command(about = "Measure primary molar and premolar widths on dental radiographs")]
#[command(version)]
struct Cli {
    /// Radiograph(s) to analyse; more than one runs a batch
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Radiograph source: panoramic, intraoral or cbct
    #[arg(long, default_value = "panoramic")]
    image_type: ImageType,

    /// Processing profile: fast, standard or high-quality
    #[arg(long, default_value = "standard")]
    quality: QualityMode,

    /// Pixel size in mm; defaults to the estimate for the image type
    #[arg(long, value_name = "MM_PER_PX")]
    calibration: Option<f64>,

    /// Radiographic magnification factor
    #[arg(long, value_name = "F")]
    magnification: Option<f64>,

    /// JSON configuration file; overrides --image-type and --quality
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Cli) -> anyhow::Result<AnalysisConfig> {
    match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Ok(AnalysisConfig::from_json(&text)?)
        }
        None => Ok(AnalysisConfig::profile(args.image_type, args.quality)),
    }
}

fn resolve_calibration(args: &Cli, config: &AnalysisConfig) -> Option<Calibration> {
    match (args.calibration, args.magnification) {
        (None, None) => None,
        (mm_per_pixel, magnification) => {
            let base = config.default_calibration();
            Some(
                Calibration::new(mm_per_pixel.unwrap_or(base.mm_per_pixel))
                    .with_magnification(magnification.unwrap_or(base.magnification)),
            )
        }
    }
}

/// Stage images are only written for a single image
fn debug_dir(args: &Cli) -> Option<&Path> {
    if args.images.len() == 1 {
        args.debug_out.as_deref()
    } else {
        None
    }
}

/// The directory must be empty or non-existent
fn prepare_debug_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.exists() {
        if fs::read_dir(dir)?.count() > 0 {
            anyhow::bail!("Debug directory is not empty: {}", dir.display());
        }
    } else {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn save_stages(recorder: &StageRecorder, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    for stage in &recorder.stages {
        let path = dir.join(stage.file_name());
        stage
            .image
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        debug!("Debug: saved {}", path.display());
    }
    Ok(())
}

fn load_image(path: &Path) -> Result<DynamicImage, AnalysisError> {
    ImageReader::open(path)
        .map_err(|e| AnalysisError::image_load(format!("{}: {e}", path.display())))?
        .decode()
        .map_err(|e| AnalysisError::image_load(format!("{}: {e}", path.display())))
}

fn print_result(name: &str, result: &AnalysisResult) {
    println!("\n=== Leeway Space Analysis: {} ===", name);
    println!("Resolution: {}", result.resolution);
    println!(
        "Regions: {} detected, {} classified, {} valid pair(s)",
        result.detected_region_count, result.classified_tooth_count, result.validated_pair_count
    );
    println!(
        "Primary second molar: {:.2} mm ({:.1} px, {:?}) - confidence: {:.2}",
        result.molar.width_mm,
        result.molar.width_pixels,
        result.molar.method,
        result.molar.confidence
    );
    println!(
        "Second premolar:      {:.2} mm ({:.1} px, {:?}) - confidence: {:.2}",
        result.premolar.width_mm,
        result.premolar.width_pixels,
        result.premolar.method,
        result.premolar.confidence
    );
    println!(
        "Difference: {:.2} mm ({:.1}%) - {}",
        result.difference.value_mm, result.difference.percentage, result.difference.significance
    );
    println!(
        "Pair confidence: {:.2}, anatomical score: {:.2}",
        result.best_pair_confidence, result.anatomical_score
    );

    println!("\nClinical recommendations:");
    for line in &result.recommendations {
        println!("  - {}", line);
    }
    if !result.quality_warnings.is_empty() {
        println!("\nQuality warnings:");
        for line in &result.quality_warnings {
            println!("  ! {}", line);
        }
    }
}

fn run_single(
    args: &Cli,
    analyzer: &Analyzer,
    calibration: Option<Calibration>,
) -> anyhow::Result<()> {
    let path = &args.images[0];
    info!("Loading image: {}", path.display());
    let img = load_image(path)?;
    info!("Image loaded: {}x{}", img.width(), img.height());

    let outcome = match &args.debug_out {
        Some(dir) => {
            let mut recorder = StageRecorder::default();
            let outcome = analyzer.analyze_observed(&img, calibration, &mut recorder);
            save_stages(&recorder, dir)?;
            outcome
        }
        None => analyzer.analyze(&img, calibration),
    };

    match outcome {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&path.display().to_string(), &result);
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                let body = json!({ "error": err.to_string(), "suggestions": err.suggestions() });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprintln!("Suggestions:");
                for line in err.suggestions() {
                    eprintln!("  - {}", line);
                }
            }
            Err(err.into())
        }
    }
}

fn run_batch(
    args: &Cli,
    analyzer: &Analyzer,
    calibration: Option<Calibration>,
) -> anyhow::Result<()> {
    let items = args.images.iter().map(|path| BatchItem {
        name: path.display().to_string(),
        image: load_image(path),
    });
    let report = BatchRunner::new(analyzer)
        .with_calibration(calibration)
        .run(items);

    if args.json {
        let entries: Vec<serde_json::Value> = report
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                BatchOutcome::Success { name, result } => {
                    json!({ "image": name, "status": "success", "result": result })
                }
                BatchOutcome::Failure { name, error } => json!({
                    "image": name,
                    "status": "failure",
                    "error": error.to_string(),
                    "suggestions": error.suggestions(),
                }),
                BatchOutcome::Skipped { name } => json!({ "image": name, "status": "skipped" }),
            })
            .collect();
        let body = json!({
            "aborted": report.aborted,
            "succeeded": report.successes(),
            "failed": report.failures(),
            "skipped": report.skipped(),
            "images": entries,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for outcome in &report.outcomes {
            match outcome {
                BatchOutcome::Success { name, result } => print_result(name, result),
                BatchOutcome::Failure { name, error } => {
                    println!("\n=== {} ===\nFailed: {}", name, error)
                }
                BatchOutcome::Skipped { name } => println!("\n=== {} ===\nSkipped", name),
            }
        }
        println!(
            "\n{} succeeded, {} failed, {} skipped{}",
            report.successes(),
            report.failures(),
            report.skipped(),
            if report.aborted { " (batch aborted)" } else { "" }
        );
    }

    if report.successes() == 0 {
        anyhow::bail!("No image was analysed successfully");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = load_config(&args)?;
    let calibration = resolve_calibration(&args, &config);
    if let Some(calibration) = &calibration {
        calibration.validate()?;
    }
    let analyzer = Analyzer::new(config)?;

    if let Some(dir) = debug_dir(&args) {
        prepare_debug_dir(dir)?;
    }

    if args.images.len() == 1 {
        run_single(&args, &analyzer, calibration)
    } else {
        if args.debug_out.is_some() {
            info!("--debug-out is ignored in batch mode");
        }
        run_batch(&args, &analyzer, calibration)
    }
}
