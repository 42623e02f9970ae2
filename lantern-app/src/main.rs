//! Lantern
//!
//! Headless viewer for still images, video files, local cameras and
//! network streams.
//!
//! Features:
//! - One source at a time, replaced cleanly when another is opened
//! - Live sources streamed from a background thread, latest frame wins
//! - Frame seeking for videos
//! - Timing overlay text logged per frame
//! - Snapshots of the rendered frame pixels (without the overlay text)

mod app;
mod dialogs;
mod presets;

use app::{LoggingConfig, SourceChoice, ViewerBuilder};
use clap::{ArgGroup, Parser};
use dialogs::PickKind;
use lantern_capture::{CameraRequest, FourCC};
use presets::Resolution;
use std::error::Error;
use std::path::PathBuf;

/// Lantern - Multi-source frame viewer
#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").args(["image", "video", "camera", "network", "pick"])))]
struct Args {
    /// Still image to show
    #[arg(long)]
    image: Option<PathBuf>,

    /// Video file to show
    #[arg(long)]
    video: Option<PathBuf>,

    /// Local camera index
    #[arg(long, num_args = 0..=1, default_missing_value = "0")]
    camera: Option<u32>,

    /// Requested camera resolution, e.g. 1280x720
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Requested camera pixel format, e.g. MJPG
    #[arg(long)]
    fourcc: Option<FourCC>,

    /// Network camera address, e.g. rtsp://host/stream
    #[arg(long)]
    network: Option<String>,

    /// Use a generated camera instead of a device
    #[arg(long)]
    synthetic: bool,

    /// Live frames to render before stopping
    #[arg(long, default_value_t = 30)]
    frames: u64,

    /// Video frame to show after the first; repeatable
    #[arg(long)]
    seek: Vec<u64>,

    /// Save the last rendered frame to this file; overlay text is not drawn
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print source properties
    #[arg(long)]
    properties: bool,

    /// Pick the file to open with a dialog
    #[arg(long, value_enum)]
    pick: Option<PickKind>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send traces to Tracy
    #[arg(long)]
    tracy: bool,
}

fn source_choice(args: &Args) -> Option<SourceChoice> {
    if let Some(path) = &args.image {
        return Some(SourceChoice::Image(path.clone()));
    }
    if let Some(path) = &args.video {
        return Some(SourceChoice::Video(path.clone()));
    }
    if let Some(address) = &args.network {
        return Some(SourceChoice::Network(address.clone()));
    }
    if let Some(kind) = args.pick {
        let path = dialogs::pick_file(kind)?;
        return Some(match kind {
            PickKind::Image => SourceChoice::Image(path),
            PickKind::Video => SourceChoice::Video(path),
        });
    }
    if args.camera.is_some() || args.synthetic {
        let mut request = CameraRequest::default_camera().with_index(args.camera.unwrap_or(0));
        if let Some(resolution) = args.resolution {
            request = request.with_resolution(resolution.width, resolution.height);
        }
        if let Some(fourcc) = args.fourcc {
            request = request.with_fourcc(fourcc);
        }
        return Some(SourceChoice::Camera(request));
    }
    None
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let logging = LoggingConfig {
        level: args.log_level.clone(),
        enable_tracy: args.tracy,
    };

    let Some(source) = source_choice(&args) else {
        println!("Nothing to open.");
        return Ok(());
    };

    let mut viewer = ViewerBuilder::new()
        .with_logging(logging)
        .with_source(source)
        .with_synthetic_cameras(args.synthetic)
        .with_frame_limit(args.frames)
        .with_seeks(args.seek)
        .with_properties(args.properties);
    if let Some(path) = args.snapshot {
        viewer = viewer.with_snapshot(path);
    }

    viewer.run()?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
