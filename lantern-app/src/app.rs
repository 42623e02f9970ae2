//! Viewer configuration and the headless run loop with builder pattern.

use crate::presets::Resolution;
use lantern_capture::{
    CameraRequest, CaptureError, CaptureResource, SourceDescriptor, SourceOpener, SyntheticCamera,
    SystemOpener,
};
use lantern_session::{CanvasSurface, Mode, Notice, SessionController, SessionError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

const SYNTHETIC_FPS: f64 = 30.0;

/// Logging configuration.
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No source selected")]
    NoSource,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Frame {frame} is outside the video (last frame is {last})")]
    SeekOutOfRange { frame: u64, last: u64 },

    #[error("Failed to save snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}

/// The source to open.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChoice {
    Image(PathBuf),
    Video(PathBuf),
    Camera(CameraRequest),
    Network(String),
}

/// Opens sources with the system backends, optionally standing in a
/// generated camera for local devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerOpener {
    synthetic_cameras: bool,
}

impl ViewerOpener {
    pub fn new(synthetic_cameras: bool) -> Self {
        Self { synthetic_cameras }
    }
}

impl SourceOpener for ViewerOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn CaptureResource>, CaptureError> {
        match descriptor {
            SourceDescriptor::Camera(request) if self.synthetic_cameras => {
                let (width, height) = request.resolution.unwrap_or_else(|| {
                    let preset = Resolution::default();
                    (preset.width, preset.height)
                });
                Ok(Box::new(SyntheticCamera::new(width, height, SYNTHETIC_FPS)))
            }
            _ => SystemOpener.open(descriptor),
        }
    }
}

/// What a run showed.
#[derive(Debug, Default)]
pub struct ViewerReport {
    pub title: String,
    pub frames_rendered: u64,
    pub last_overlay: Option<String>,
    pub properties: Vec<String>,
    pub notices: Vec<Notice>,
}

/// Builder for configuring and running the viewer.
pub struct ViewerBuilder {
    source: Option<SourceChoice>,
    synthetic_cameras: bool,
    frame_limit: u64,
    seeks: Vec<u64>,
    snapshot: Option<PathBuf>,
    print_properties: bool,
    idle_timeout: Duration,
    logging: Option<LoggingConfig>,
}

impl ViewerBuilder {
    /// Create a new ViewerBuilder with default settings.
    pub fn new() -> Self {
        Self {
            source: None,
            synthetic_cameras: false,
            frame_limit: 30,
            seeks: Vec::new(),
            snapshot: None,
            print_properties: false,
            idle_timeout: Duration::from_secs(5),
            logging: None,
        }
    }

    pub fn with_source(mut self, source: SourceChoice) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace local cameras with a generated one.
    pub fn with_synthetic_cameras(mut self, enabled: bool) -> Self {
        self.synthetic_cameras = enabled;
        self
    }

    /// Stop live sources after this many rendered frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = frames;
        self
    }

    /// Video frames to show, in order, after the first one.
    pub fn with_seeks(mut self, seeks: Vec<u64>) -> Self {
        self.seeks = seeks;
        self
    }

    /// Save the last rendered frame's pixels to `path`. Overlay text is
    /// logged and reported, not drawn into the snapshot.
    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot = Some(path);
        self
    }

    pub fn with_properties(mut self, print: bool) -> Self {
        self.print_properties = print;
        self
    }

    /// Give up on a live source after this long without a frame.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Install a tracing subscriber before running.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Open the source, show it, and tear the session down.
    pub fn run(self) -> Result<ViewerReport, AppError> {
        if let Some(logging) = &self.logging {
            init_logging(logging);
        }

        let source = self.source.clone().ok_or(AppError::NoSource)?;
        let mut controller =
            SessionController::new(ViewerOpener::new(self.synthetic_cameras));
        let mut surface = CanvasSurface::new(1, 1);
        let mut report = ViewerReport::default();

        match source {
            SourceChoice::Image(path) => {
                controller.open_image(path)?;
                self.render(&controller, &mut surface, &mut report);
            }
            SourceChoice::Video(path) => {
                controller.open_video(path)?;
                self.render(&controller, &mut surface, &mut report);
                self.play_seeks(&mut controller, &mut surface, &mut report)?;
            }
            SourceChoice::Camera(request) => {
                controller.open_live_camera(request)?;
                self.stream(&mut controller, &mut surface, &mut report);
            }
            SourceChoice::Network(address) => {
                controller.open_network_camera(&address)?;
                self.stream(&mut controller, &mut surface, &mut report);
            }
        }

        report.title = controller.title();
        report.properties = controller.properties();
        report.notices = controller.take_notices();
        info!("{}", report.title);

        if self.print_properties {
            for line in &report.properties {
                println!("{line}");
            }
        }
        for notice in &report.notices {
            println!("{notice}");
        }
        if let Some(path) = &self.snapshot {
            surface.save(path)?;
            info!("Saved snapshot to {}", path.display());
        }

        controller.clear();
        Ok(report)
    }

    fn play_seeks<O: SourceOpener>(
        &self,
        controller: &mut SessionController<O>,
        surface: &mut CanvasSurface,
        report: &mut ViewerReport,
    ) -> Result<(), AppError> {
        for &frame in &self.seeks {
            if let Some(range) = controller.video_frame_range() {
                if !range.contains(&frame) {
                    return Err(AppError::SeekOutOfRange {
                        frame,
                        last: *range.end(),
                    });
                }
            }
            controller.seek(frame)?;
            self.render(controller, surface, report);
        }
        Ok(())
    }

    fn stream<O: SourceOpener>(
        &self,
        controller: &mut SessionController<O>,
        surface: &mut CanvasSurface,
        report: &mut ViewerReport,
    ) {
        let mut last_delivery = Instant::now();
        while report.frames_rendered < self.frame_limit && controller.mode().is_live() {
            if controller.wait_and_pump(Duration::from_millis(100)) {
                last_delivery = Instant::now();
                self.render(controller, surface, report);
            } else if last_delivery.elapsed() > self.idle_timeout {
                warn!(
                    "No frame from {} for {:?}, giving up",
                    controller.session().source_name(),
                    self.idle_timeout
                );
                break;
            }
        }
        if controller.mode() == Mode::Empty {
            info!("Source ended after {} frames", report.frames_rendered);
        }
    }

    fn render<O: SourceOpener>(
        &self,
        controller: &SessionController<O>,
        surface: &mut CanvasSurface,
        report: &mut ViewerReport,
    ) {
        let presenter = controller.presenter();
        let (width, height) = presenter.best_client_size();
        if surface.image().dimensions() != (width, height) {
            surface.resize(width, height);
        }

        if let Some(stats) = controller.render(surface) {
            let overlay = surface.overlay_text();
            info!("Frame {}: {}", stats.frame_number, overlay.replace('\n', ", "));
            report.frames_rendered += 1;
            report.last_overlay = Some(overlay);
        }
    }
}

impl Default for ViewerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn init_logging(logging: &LoggingConfig) {
    #[cfg(feature = "tracy")]
    {
        if logging.enable_tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| logging.level.clone().into()),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level)),
        )
        .with_target(false)
        .init();
}
