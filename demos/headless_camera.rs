//! Headless camera example
//!
//! This example streams a generated camera through a session controller,
//! renders every delivered frame to an in-memory canvas, and saves the last
//! one as a PNG.
//!
//! Usage:
//!   cargo run --example headless_camera -- [frames] [output.png]

use image::Rgba;
use lantern_capture::{CameraRequest, CaptureError, CaptureResource, SourceDescriptor, SyntheticCamera};
use lantern_session::{CanvasSurface, OverlayStyle, SessionController};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let frames = args.next().map(|n| n.parse::<u64>()).transpose()?.unwrap_or(60);
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("headless_camera.png"));

    // Every camera request is served by a generated source at 25 fps.
    let opener = |descriptor: &SourceDescriptor| -> Result<Box<dyn CaptureResource>, CaptureError> {
        match descriptor {
            SourceDescriptor::Camera(request) => {
                let (width, height) = request.resolution.unwrap_or((640, 480));
                Ok(Box::new(SyntheticCamera::new(width, height, 25.0)))
            }
            other => Err(CaptureError::SourceUnavailable(other.to_string())),
        }
    };

    let mut controller = SessionController::builder(opener)
        .with_waker(|| tracing::trace!("Frame ready"))
        .build();
    controller.presenter_mut().set_overlay_style(OverlayStyle {
        colour: Rgba([255, 255, 0, 255]),
        font_size: 16.0,
    });

    controller.open_live_camera(CameraRequest::default_camera().with_resolution(320, 240))?;
    info!("{}", controller.title());

    let mut surface = CanvasSurface::new(320, 240);
    let mut rendered = 0;
    while rendered < frames && controller.mode().is_live() {
        if controller.wait_and_pump(Duration::from_millis(200)) {
            if let Some(stats) = controller.render(&mut surface) {
                rendered += 1;
                info!(
                    "Frame {} ({}): {}",
                    stats.frame_number,
                    rendered,
                    surface.overlay_text().replace('\n', ", ")
                );
            }
        }
    }

    for line in controller.properties() {
        info!("{}", line);
    }

    controller.clear();
    surface.save(&output)?;
    info!("Rendered {} frames, last one saved to {}", rendered, output.display());
    Ok(())
}
