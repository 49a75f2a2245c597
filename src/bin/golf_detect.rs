use bytesize::ByteSize;
use clap::Parser;
use log::{info, warn};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use golf_ball_detector::detect::{DetectionPipeline, PipelineConfig, decode_image};
use golf_ball_detector::frame::{DetectionEnvelope, FrameMetadata, archive_frame};
use golf_ball_detector::plot::render_overlay_rgba;

#[derive(Parser, Debug)]
#[command(
    name = "golf_detect",
    about = "Detect golf balls in still images and print JSON detections",
    version
)]
struct Cli {
    /// Image files to process
    inputs: Vec<PathBuf>,

    /// Directory of images to process (sorted by file name)
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Timestamp echoed in the output
    #[arg(long = "timestamp")]
    timestamp: Option<String>,

    /// Frame number echoed in the output; numbers count up from it for several inputs
    #[arg(long = "frame-number")]
    frame_number: Option<u64>,

    /// Device pitch in degrees
    #[arg(long = "pitch", allow_hyphen_values = true)]
    pitch: Option<f64>,

    /// Device roll in degrees
    #[arg(long = "roll", allow_hyphen_values = true)]
    roll: Option<f64>,

    /// JSON file with pipeline parameters; missing fields keep their defaults
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Save each decoded frame as JPEG into this directory
    #[arg(long = "archive-dir")]
    archive_dir: Option<PathBuf>,

    /// Write `<stem>_detections.png` overlays into the working directory
    #[arg(long = "plot", short = 'p')]
    plot: bool,

    /// Pretty-print the JSON output
    #[arg(long = "pretty")]
    pretty: bool,
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "gif" | "tif" | "tiff" | "webp"
    )
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
    Ok(config)
}

fn collect_inputs(cli: &Cli) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut images = cli.inputs.clone();

    if let Some(dir) = &cli.dir {
        if !dir.is_dir() {
            return Err(format!("Not a directory: {}", dir.display()).into());
        }
        let mut found: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        found.sort();
        images.extend(found);
    }

    Ok(images)
}

fn save_plot(image_path: &Path, rgba: Vec<u8>, w: u32, h: u32) {
    let stem = image_path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("frame");
    let out_plot = PathBuf::from(format!("{stem}_detections.png"));
    match image::RgbaImage::from_raw(w, h, rgba) {
        Some(img) => {
            if let Err(e) = img.save(&out_plot) {
                eprintln!(
                    "Failed to save plot {} for {}: {e}",
                    out_plot.display(),
                    image_path.display()
                );
            }
        }
        None => eprintln!(
            "Failed to build RGBA image for plot {} ({w}x{h})",
            out_plot.display()
        ),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let images = collect_inputs(&cli)?;
    if images.is_empty() {
        eprintln!("No images given; pass file paths or --dir");
        return Ok(());
    }

    let pipeline = DetectionPipeline::new(load_config(cli.config.as_deref())?);
    let base_metadata = FrameMetadata {
        timestamp: cli.timestamp.clone(),
        frame_number: cli.frame_number,
        pitch: cli.pitch,
        roll: cli.roll,
    };

    let batch = images.len() > 1;

    for (i, image_path) in images.iter().enumerate() {
        // each image of a batch gets its own frame number
        let metadata = if batch {
            base_metadata.nth_in_batch(i)
        } else {
            base_metadata.clone()
        };

        let bytes = match fs::read(image_path) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Failed to read {}: {e}", image_path.display());
                continue;
            }
        };
        info!(
            "{}: {}",
            image_path.display(),
            ByteSize::b(bytes.len() as u64)
        );

        let golf_balls = match decode_image(&bytes) {
            Ok(grid) => {
                let detections = pipeline.detect_grid(&grid);

                if let Some(dir) = &cli.archive_dir
                    && let Err(e) = archive_frame(dir, &metadata, &grid)
                {
                    warn!("Failed to archive {}: {e}", image_path.display());
                }

                if cli.plot {
                    match render_overlay_rgba(&grid, &detections) {
                        Ok(rgba) => save_plot(image_path, rgba, grid.width(), grid.height()),
                        Err(e) => eprintln!(
                            "Failed to render plot for {}: {e}",
                            image_path.display()
                        ),
                    }
                }

                detections
            }
            Err(e) => {
                warn!("Could not decode {}: {e}", image_path.display());
                Vec::new()
            }
        };

        let envelope = DetectionEnvelope::new(metadata, golf_balls);
        let json = if cli.pretty {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };
        println!("{json}");
    }

    Ok(())
}
