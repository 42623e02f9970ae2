//! Session lifecycle: opening sources, stopping workers, seeking, and
//! draining deliveries on the UI context.
//!
//! The controller is the only thing that mutates the [`Session`]. Teardown
//! always cancels (joins) the worker before the resource is closed.

use crate::delivery::{Delivery, Envelope, Frame};
use crate::error::SessionError;
use crate::presenter::{Presenter, RenderStats};
use crate::session::{Mode, Session, SourceProperties};
use crate::slot::{SlotReceiver, SlotSender, latest_slot, latest_slot_with_waker};
use crate::surface::DisplaySurface;
use crate::worker::{AcquisitionWorker, WorkerConfig};
use lantern_capture::{
    CameraRequest, CaptureError, CaptureResource, FrameData, Property, SourceDescriptor,
    SourceOpener, SystemOpener,
};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

type Waker = Box<dyn Fn() + Send + Sync>;

/// Session tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub worker: WorkerConfig,
}

/// A user-visible status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(message) => write!(f, "{message}"),
            Notice::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

/// Builder for [`SessionController`].
pub struct SessionControllerBuilder<O: SourceOpener> {
    opener: O,
    config: SessionConfig,
    presenter: Option<Presenter>,
    waker: Option<Waker>,
}

impl<O: SourceOpener> SessionControllerBuilder<O> {
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_worker_config(mut self, worker: WorkerConfig) -> Self {
        self.config.worker = worker;
        self
    }

    /// Use a presenter with a custom converter or overlay style.
    pub fn with_presenter(mut self, presenter: Presenter) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Called from the worker thread after each delivery, e.g. to request a
    /// repaint.
    pub fn with_waker<W>(mut self, waker: W) -> Self
    where
        W: Fn() + Send + Sync + 'static,
    {
        self.waker = Some(Box::new(waker));
        self
    }

    pub fn build(self) -> SessionController<O> {
        let (sender, receiver) = match self.waker {
            Some(waker) => latest_slot_with_waker(waker),
            None => latest_slot(),
        };
        SessionController {
            opener: self.opener,
            config: self.config,
            session: Session::new(),
            presenter: self.presenter.unwrap_or_default(),
            sender,
            receiver,
            notices: Vec::new(),
        }
    }
}

/// Orchestrates the one active session.
pub struct SessionController<O: SourceOpener = SystemOpener> {
    opener: O,
    config: SessionConfig,
    session: Session,
    presenter: Presenter,
    sender: SlotSender<Envelope>,
    receiver: SlotReceiver<Envelope>,
    notices: Vec<Notice>,
}

impl SessionController<SystemOpener> {
    /// A controller opening sources with the compiled-in backends.
    pub fn system() -> Self {
        Self::new(SystemOpener)
    }
}

impl<O: SourceOpener> SessionController<O> {
    pub fn new(opener: O) -> Self {
        Self::builder(opener).build()
    }

    pub fn builder(opener: O) -> SessionControllerBuilder<O> {
        SessionControllerBuilder {
            opener,
            config: SessionConfig::default(),
            presenter: None,
            waker: None,
        }
    }

    /// Show a still image. No resource or worker stays alive afterwards.
    pub fn open_image(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.clear();

        let descriptor = SourceDescriptor::image(path.as_ref());
        let mut resource = self.open_resource(&descriptor)?;

        let started = Instant::now();
        let pulled = resource.pull_frame();
        let acquire = started.elapsed();
        resource.close();

        let data = match pulled {
            Ok(Some(data)) => data,
            Ok(None) => return Err(self.fail(SessionError::FrameUnavailable { frame: 0 })),
            Err(e) => return Err(self.fail(e.into())),
        };

        if let Err(e) = self.presenter.show(Frame::new(data, acquire)) {
            let err = self.fail(e.into());
            self.clear();
            return Err(err);
        }

        self.session.mode = Mode::Image;
        self.session.source_name = descriptor.to_string();
        info!("Opened image {}", self.session.source_name);
        Ok(())
    }

    /// Open a video file and show its first frame.
    ///
    /// If the first frame cannot be shown the session stays in video mode
    /// with nothing displayed, so the user can still seek elsewhere.
    pub fn open_video(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.clear();

        let descriptor = SourceDescriptor::video(path.as_ref());
        let resource = self.open_resource(&descriptor)?;

        self.session.frame_count = resource
            .property(Property::FrameCount)
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| n as u64);
        self.session.resource = Some(resource);
        self.session.mode = Mode::Video;
        self.session.source_name = descriptor.to_string();
        self.session.current_frame = 0;

        info!(
            "Opened video {} ({:?} frames)",
            self.session.source_name, self.session.frame_count
        );
        self.show_video_frame(0)
    }

    /// Start streaming from a local camera.
    pub fn open_live_camera(&mut self, request: CameraRequest) -> Result<(), SessionError> {
        self.open_live(SourceDescriptor::Camera(request), Mode::LiveCamera)
    }

    /// Start streaming from a network camera. The address is passed through
    /// to the opener untouched apart from trimming.
    pub fn open_network_camera(&mut self, address: &str) -> Result<(), SessionError> {
        let address = address.trim();
        if address.is_empty() {
            self.clear();
            let err = SessionError::Source(CaptureError::SourceUnavailable(
                "empty network address".to_string(),
            ));
            return Err(self.fail(err));
        }
        self.open_live(SourceDescriptor::network(address), Mode::NetworkCamera)
    }

    fn open_live(&mut self, descriptor: SourceDescriptor, mode: Mode) -> Result<(), SessionError> {
        self.clear();

        let mut resource = self.open_resource(&descriptor)?;
        if let SourceDescriptor::Camera(request) = &descriptor {
            apply_camera_hints(resource.as_mut(), request);
        }
        let properties = SourceProperties::read(resource.as_ref());

        let worker = AcquisitionWorker::new(self.config.worker.clone());
        let handle = match worker.start(resource, self.sender.clone(), self.session.generation) {
            Ok(handle) => handle,
            Err(e) => {
                let err = self.fail(e.into());
                self.clear();
                return Err(err);
            }
        };

        self.session.worker = Some(handle);
        self.session.mode = mode;
        self.session.source_name = descriptor.to_string();
        self.session.properties = Some(properties);
        info!("Streaming from {} ({})", self.session.source_name, mode);
        Ok(())
    }

    /// Stop everything and show nothing.
    ///
    /// The worker is joined before its resource is closed, and any delivery
    /// it left behind is discarded.
    pub fn clear(&mut self) {
        if let Some(worker) = self.session.worker.take() {
            match worker.cancel() {
                Ok(mut resource) => resource.close(),
                Err(e) => error!("Failed to stop acquisition worker: {}", e),
            }
        }
        if let Some(mut resource) = self.session.resource.take() {
            resource.close();
        }
        if self.receiver.drain() {
            debug!("Discarded a pending delivery from the previous session");
        }

        self.session.generation = self.session.generation.next();
        self.session.mode = Mode::Empty;
        self.session.source_name.clear();
        self.session.current_frame = 0;
        self.session.frame_count = None;
        self.session.properties = None;
        self.presenter.clear();
    }

    /// Show video frame `frame`. Does nothing if it is already shown.
    pub fn seek(&mut self, frame: u64) -> Result<(), SessionError> {
        if self.session.mode != Mode::Video {
            return Err(SessionError::NotSeekable(self.session.mode));
        }
        if frame == self.session.current_frame {
            return Ok(());
        }
        self.session.current_frame = frame;
        self.show_video_frame(frame)
    }

    fn show_video_frame(&mut self, frame: u64) -> Result<(), SessionError> {
        let started = Instant::now();
        let pulled = match self.session.resource.as_mut() {
            Some(resource) => positioned_pull(resource.as_mut(), frame),
            None => Err(CaptureError::Closed),
        };
        let acquire = started.elapsed();

        match pulled {
            Ok(Some(data)) => match self.presenter.show(Frame::new(data, acquire)) {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!("Could not convert frame {}", frame);
                    Err(self.fail(e.into()))
                }
            },
            Ok(None) => {
                self.presenter.clear();
                Err(self.fail(SessionError::FrameUnavailable { frame }))
            }
            Err(e) => {
                self.presenter.clear();
                error!("Could not retrieve frame {}: {}", frame, e);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Process the pending delivery, if any. Returns whether the display
    /// changed.
    pub fn pump(&mut self) -> bool {
        match self.receiver.take() {
            Some(envelope) => self.dispatch(envelope),
            None => false,
        }
    }

    /// Wait up to `timeout` for a delivery, then process it.
    pub fn wait_and_pump(&mut self, timeout: Duration) -> bool {
        match self.receiver.wait_timeout(timeout) {
            Some(envelope) => self.dispatch(envelope),
            None => false,
        }
    }

    fn dispatch(&mut self, envelope: Envelope) -> bool {
        if envelope.generation != self.session.generation || !self.session.mode.is_live() {
            debug!(
                "Dropping stale delivery from generation {}",
                envelope.generation.value()
            );
            return false;
        }

        match envelope.delivery {
            Delivery::Frame(frame) => {
                self.presenter.receive(Delivery::Frame(frame));
                true
            }
            Delivery::SourceEnded => {
                let message = match self.session.mode {
                    Mode::NetworkCamera => "Connection to the network camera lost.",
                    _ => "Connection to the camera lost.",
                };
                self.report_error(message.to_string());
                self.clear();
                self.presenter.receive(Delivery::SourceEnded);
                true
            }
        }
    }

    /// Paint the current frame.
    pub fn render(&self, surface: &mut dyn DisplaySurface) -> Option<RenderStats> {
        self.presenter.render(surface)
    }

    /// Name/value lines describing the current source.
    pub fn properties(&self) -> Vec<String> {
        let mut lines = vec![format!("Source: {}", self.session.source_name)];

        match self.session.mode {
            Mode::Empty => {}
            Mode::Image => {
                if let Some(bitmap) = self.presenter.bitmap() {
                    lines.push(format!("Width: {}", bitmap.width()));
                    lines.push(format!("Height: {}", bitmap.height()));
                }
            }
            Mode::Video => {
                if let Some(resource) = &self.session.resource {
                    let properties = SourceProperties::read(resource.as_ref());
                    push_source_properties(&mut lines, &properties);
                    self.push_video_properties(&mut lines, resource.as_ref());
                }
            }
            Mode::LiveCamera | Mode::NetworkCamera => {
                if let Some(properties) = &self.session.properties {
                    push_source_properties(&mut lines, properties);
                }
            }
        }

        lines
    }

    fn push_video_properties(&self, lines: &mut Vec<String>, resource: &dyn CaptureResource) {
        let current = self.session.current_frame;
        let position_ms = resource
            .property(Property::Fps)
            .filter(|fps| *fps > 0.0)
            .map(|fps| current as f64 * 1000.0 / fps);

        lines.push(format!("Current frame: {current}"));
        lines.push(format!(
            "Current time: {}",
            or_na(position_ms.map(format_clock))
        ));
        lines.push(format!(
            "Total frame count: {}",
            or_na(self.session.frame_count.map(|n| n.to_string()))
        ));
        lines.push(format!(
            "Bitrate: {}",
            or_na(
                resource
                    .property(Property::Bitrate)
                    .map(|bps| format!("{:.0} kbits/s", bps / 1000.0))
            )
        ));
    }

    /// Window title for the current mode.
    pub fn title(&self) -> String {
        format!("Lantern: {}", self.session.mode)
    }

    /// Valid seek targets in video mode.
    pub fn video_frame_range(&self) -> Option<RangeInclusive<u64>> {
        if self.session.mode != Mode::Video {
            return None;
        }
        self.session
            .frame_count
            .filter(|&n| n > 0)
            .map(|n| 0..=n - 1)
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut Presenter {
        &mut self.presenter
    }

    /// Status messages since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> SlotSender<Envelope> {
        self.sender.clone()
    }

    fn open_resource(
        &mut self,
        descriptor: &SourceDescriptor,
    ) -> Result<Box<dyn CaptureResource>, SessionError> {
        info!("Opening {}", descriptor);
        self.opener
            .open(descriptor)
            .map_err(|e| self.fail(e.into()))
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        self.report_error(err.to_string());
        err
    }

    fn report_error(&mut self, message: String) {
        error!("{}", message);
        self.notices.push(Notice::Error(message));
    }
}

impl<O: SourceOpener> Drop for SessionController<O> {
    fn drop(&mut self) {
        self.clear();
    }
}

fn positioned_pull(
    resource: &mut dyn CaptureResource,
    frame: u64,
) -> Result<Option<FrameData>, CaptureError> {
    if resource.property(Property::Position) != Some(frame as f64) {
        resource.seek(frame)?;
    }
    resource.pull_frame()
}

fn apply_camera_hints(resource: &mut dyn CaptureResource, request: &CameraRequest) {
    if let Some((width, height)) = request.resolution {
        let accepted = resource.set_property(Property::Width, width as f64)
            & resource.set_property(Property::Height, height as f64);
        if !accepted {
            debug!("Camera did not accept {}x{}", width, height);
        }
    }
    if let Some(fourcc) = request.fourcc {
        if !resource.set_property(Property::FourCC, fourcc.to_u32() as f64) {
            debug!("Camera did not accept FOURCC {}", fourcc);
        }
    }
}

fn push_source_properties(lines: &mut Vec<String>, properties: &SourceProperties) {
    lines.push(format!("Backend: {}", properties.backend));
    lines.push(format!(
        "Width: {}",
        or_na(properties.width.map(|w| format!("{w:.0}")))
    ));
    lines.push(format!(
        "Height: {}",
        or_na(properties.height.map(|h| format!("{h:.0}")))
    ));
    lines.push(format!(
        "FourCC: {}",
        or_na(properties.fourcc.map(|code| code.to_string()))
    ));
    lines.push(format!(
        "FPS: {}",
        or_na(properties.fps.map(|fps| format!("{fps:.1}")))
    ));
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| "n/a".to_string())
}

/// Format milliseconds as `HH:MM:SS`.
fn format_clock(ms: f64) -> String {
    let total = (ms.max(0.0) / 1000.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Tracker, TrackedResource};
    use image::{Rgb, RgbImage};
    use lantern_capture::{FrameSequence, StillImage, SyntheticCamera};
    use std::thread;

    type Opened = Result<Box<dyn CaptureResource>, CaptureError>;
    type FakeOpener = Box<dyn Fn(&SourceDescriptor) -> Opened>;

    fn fast_config() -> WorkerConfig {
        WorkerConfig::default()
            .with_max_consecutive_failures(None)
            .with_failure_backoff(Duration::from_millis(1))
    }

    /// Opens every source kind against instrumented fakes sharing `tracker`.
    fn fake_opener(
        tracker: Tracker,
        fail_after: Option<u64>,
        live_limit: Option<u64>,
    ) -> FakeOpener {
        Box::new(move |descriptor: &SourceDescriptor| -> Opened {
            match descriptor {
                SourceDescriptor::Camera(_) | SourceDescriptor::Network(_) => {
                    let mut camera = SyntheticCamera::new(8, 8, 0.0);
                    if let Some(limit) = live_limit {
                        camera = camera.with_limit(limit);
                    }
                    let mut resource =
                        TrackedResource::new(camera, &tracker).as_kind(descriptor.kind());
                    if let Some(count) = fail_after {
                        resource = resource.failing_after(count);
                    }
                    Ok(Box::new(resource))
                }
                SourceDescriptor::Video(_) => Ok(Box::new(TrackedResource::new(
                    FrameSequence::numbered(10, 4, 4),
                    &tracker,
                ))),
                SourceDescriptor::Image(_) => Ok(Box::new(StillImage::from_image(
                    RgbImage::from_pixel(6, 5, Rgb([1, 2, 3])),
                ))),
            }
        })
    }

    fn controller(
        tracker: &Tracker,
        fail_after: Option<u64>,
        live_limit: Option<u64>,
    ) -> SessionController<FakeOpener> {
        SessionController::builder(fake_opener(tracker.clone(), fail_after, live_limit))
            .with_worker_config(fast_config())
            .build()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_missing_video_leaves_session_empty() {
        let mut controller = SessionController::system();
        let err = controller
            .open_video("/this/video/does/not/exist.mp4")
            .unwrap_err();

        assert!(err.is_source_unavailable());
        assert_eq!(controller.mode(), Mode::Empty);
        assert!(!controller.presenter().has_frame());
        assert!(!controller.session().has_resource());
        assert!(controller.session().is_consistent());
        assert_eq!(controller.take_notices().len(), 1);
    }

    #[test]
    fn test_clear_mid_stream_stops_pulling() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();
        assert_eq!(controller.mode(), Mode::LiveCamera);
        assert!(controller.session().is_consistent());

        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.presenter().frames_shown() < 5 {
            assert!(Instant::now() < deadline, "no frames delivered");
            controller.wait_and_pump(Duration::from_millis(50));
        }

        controller.clear();
        assert!(tracker.is_closed());
        assert!(!tracker.closed_during_pull());

        let pulls_at_close = tracker.pulls();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(tracker.pulls(), pulls_at_close);
        assert!(!tracker.pulled_after_close());

        assert_eq!(controller.mode(), Mode::Empty);
        assert!(!controller.presenter().has_frame());
        assert!(controller.session().is_consistent());
        assert!(!controller.pump());
    }

    #[test]
    fn test_only_latest_pending_frame_is_rendered() {
        let tracker = Tracker::new();
        // Four frames, then the camera keeps failing without ending.
        let mut controller = controller(&tracker, Some(4), None);
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();

        wait_for(|| tracker.pulls() > 5);
        assert!(controller.pump());
        assert_eq!(controller.presenter().frames_shown(), 1);
        assert_eq!(controller.presenter().current_frame_number(), Some(3));
        assert!(!controller.pump());
    }

    #[test]
    fn test_stale_delivery_is_discarded() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, Some(1), None);
        controller
            .open_network_camera("rtsp://camera.local/stream")
            .unwrap();
        assert_eq!(controller.mode(), Mode::NetworkCamera);
        wait_for(|| tracker.pulls() >= 3);

        let old_generation = controller.session().generation();
        let sender = controller.sender();
        controller.clear();
        assert_ne!(controller.session().generation(), old_generation);

        let late = Frame::new(
            FrameData::new(RgbImage::new(2, 2), 0.0, 999),
            Duration::ZERO,
        );
        sender
            .post(Envelope::new(old_generation, Delivery::Frame(late)))
            .unwrap();
        assert!(!controller.pump());
        assert!(!controller.presenter().has_frame());

        // Still stale once a new session is running.
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();
        let late = Frame::new(
            FrameData::new(RgbImage::new(2, 2), 0.0, 999),
            Duration::ZERO,
        );
        sender
            .post(Envelope::new(old_generation, Delivery::Frame(late)))
            .unwrap();
        assert!(!controller.pump());
        assert_ne!(controller.presenter().current_frame_number(), Some(999));
    }

    #[test]
    fn test_camera_loss_resets_session() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, Some(2));
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.mode() != Mode::Empty {
            assert!(Instant::now() < deadline, "source never ended");
            controller.wait_and_pump(Duration::from_millis(50));
        }

        assert!(controller.presenter().is_exhausted());
        assert!(!controller.presenter().has_frame());
        assert!(tracker.is_closed());
        assert!(controller.session().is_consistent());
        assert_eq!(
            controller.take_notices(),
            vec![Notice::Error("Connection to the camera lost.".to_string())]
        );
    }

    #[test]
    fn test_video_seek_shows_requested_frames() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller.open_video("clip.avi").unwrap();

        assert_eq!(controller.mode(), Mode::Video);
        assert!(controller.session().is_consistent());
        assert_eq!(controller.video_frame_range(), Some(0..=9));
        assert_eq!(controller.presenter().current_frame_number(), Some(0));

        tracker.set_pull_delay(Duration::from_millis(5));
        controller.seek(9).unwrap();
        assert_eq!(controller.presenter().current_frame_number(), Some(9));
        let last = controller.presenter().bitmap().unwrap().get_pixel(0, 0).0;
        let last_acquire = controller.presenter().timings().unwrap().acquire;
        assert!(last_acquire >= Duration::from_millis(5));
        assert_eq!(controller.presenter().current_timestamp(), Some(9.0 / 25.0));

        tracker.set_pull_delay(Duration::from_millis(40));
        controller.seek(0).unwrap();
        assert_eq!(controller.presenter().current_frame_number(), Some(0));
        let first = controller.presenter().bitmap().unwrap().get_pixel(0, 0).0;
        let first_acquire = controller.presenter().timings().unwrap().acquire;
        assert!(first_acquire >= Duration::from_millis(40));
        assert_ne!(first_acquire, last_acquire);
        assert_ne!(first, last);
        assert_eq!(tracker.pulls(), 3);
    }

    #[test]
    fn test_seek_to_current_frame_is_noop() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller.open_video("clip.avi").unwrap();
        controller.seek(4).unwrap();

        let pulls = tracker.pulls();
        let timings = controller.presenter().timings();
        controller.seek(4).unwrap();

        assert_eq!(tracker.pulls(), pulls);
        assert_eq!(controller.presenter().timings(), timings);
        assert_eq!(controller.session().current_frame(), 4);
    }

    #[test]
    fn test_seek_past_end_shows_nothing() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller.open_video("clip.avi").unwrap();

        assert!(controller.seek(10).is_err());
        assert!(!controller.presenter().has_frame());
        assert_eq!(controller.mode(), Mode::Video);
        assert!(controller.session().is_consistent());
    }

    #[test]
    fn test_seek_requires_video() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        assert!(matches!(
            controller.seek(1),
            Err(SessionError::NotSeekable(Mode::Empty))
        ));

        controller.open_image("still.png").unwrap();
        assert!(matches!(
            controller.seek(1),
            Err(SessionError::NotSeekable(Mode::Image))
        ));
    }

    #[test]
    fn test_open_image() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller.open_image("still.png").unwrap();

        assert_eq!(controller.mode(), Mode::Image);
        assert!(controller.session().is_consistent());
        assert_eq!(controller.title(), "Lantern: Image");
        assert_eq!(
            controller.properties(),
            vec![
                "Source: still.png".to_string(),
                "Width: 6".to_string(),
                "Height: 5".to_string(),
            ]
        );
    }

    #[test]
    fn test_video_properties() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller.open_video("clip.avi").unwrap();
        controller.seek(5).unwrap();

        let properties = controller.properties();
        assert!(properties.contains(&"Backend: tracked".to_string()));
        assert!(properties.contains(&"Width: 4".to_string()));
        assert!(properties.contains(&"FPS: 25.0".to_string()));
        assert!(properties.contains(&"FourCC: n/a".to_string()));
        assert!(properties.contains(&"Current frame: 5".to_string()));
        assert!(properties.contains(&"Current time: 00:00:00".to_string()));
        assert!(properties.contains(&"Total frame count: 10".to_string()));
        assert!(properties.contains(&"Bitrate: n/a".to_string()));
    }

    #[test]
    fn test_camera_hints_are_applied() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller
            .open_live_camera(CameraRequest::default().with_resolution(32, 24))
            .unwrap();

        let properties = controller.properties();
        assert_eq!(properties[0], "Source: Default camera");
        assert!(properties.contains(&"Width: 32".to_string()));
        assert!(properties.contains(&"Height: 24".to_string()));
        assert_eq!(controller.title(), "Lantern: Camera");
    }

    #[test]
    fn test_new_source_replaces_running_worker() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();
        wait_for(|| tracker.pulls() >= 1);
        let first_generation = controller.session().generation();

        let video_tracker = Tracker::new();
        controller.opener = fake_opener(video_tracker.clone(), None, None);
        controller.open_video("clip.avi").unwrap();

        assert!(tracker.is_closed());
        assert!(!tracker.closed_during_pull());
        assert!(!video_tracker.is_closed());
        assert_eq!(controller.mode(), Mode::Video);
        assert!(controller.session().generation() > first_generation);
        assert!(controller.session().is_consistent());
    }

    #[test]
    fn test_empty_network_address() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        let err = controller.open_network_camera("  ").unwrap_err();
        assert!(err.is_source_unavailable());
        assert_eq!(controller.mode(), Mode::Empty);
        assert_eq!(tracker.pulls(), 0);
    }

    #[test]
    fn test_dropping_controller_stops_worker() {
        let tracker = Tracker::new();
        let mut controller = controller(&tracker, None, None);
        controller
            .open_live_camera(CameraRequest::default_camera())
            .unwrap();
        wait_for(|| tracker.pulls() >= 1);
        drop(controller);
        assert!(tracker.is_closed());
        assert!(!tracker.pulled_after_close());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(3_725_000.0), "01:02:05");
    }
}
