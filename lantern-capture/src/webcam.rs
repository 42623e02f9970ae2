//! Webcam capture using nokhwa.
//!
//! nokhwa's `Camera` is not `Send`, so it lives on a dedicated device thread.
//! `WebcamCapture` forwards each pull to that thread and blocks for the reply,
//! which keeps the usual blocking-pull contract.

use crate::fourcc::FourCC;
use crate::source::{
    CameraRequest, CaptureError, CaptureResource, FrameData, Property, SourceKind,
};
use image::RgbImage;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_RESOLUTION: (u32, u32) = (640, 480);
const DEFAULT_FPS: u32 = 30;

enum Request {
    Pull,
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct DeviceInfo {
    resolution: (u32, u32),
    fps: u32,
    fourcc: Option<FourCC>,
}

/// Webcam capture source.
pub struct WebcamCapture {
    requests: mpsc::Sender<Request>,
    replies: mpsc::Receiver<Result<FrameData, CaptureError>>,
    device_thread: Option<JoinHandle<()>>,
    info: DeviceInfo,
    frame_count: u64,
    active: bool,
}

impl WebcamCapture {
    /// Open the camera described by `request`, honouring its hints where the
    /// device allows.
    pub fn open(request: CameraRequest) -> Result<Self, CaptureError> {
        let (width, height) = request.resolution.unwrap_or(DEFAULT_RESOLUTION);
        info!(
            "Opening webcam {} at {}x{} ({:?})",
            request.index, width, height, request.fourcc
        );

        let (init_tx, init_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();

        let device_thread = thread::Builder::new()
            .name(format!("lantern-webcam-{}", request.index))
            .spawn(move || {
                let camera = match open_camera(request) {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let (mut camera, info) = camera;
                let _ = init_tx.send(Ok(info));
                device_loop(&mut camera, request_rx, reply_tx);
                if let Err(e) = camera.stop_stream() {
                    warn!("Failed to stop webcam stream: {}", e);
                }
            })?;

        let info = match init_rx.recv() {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                let _ = device_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = device_thread.join();
                return Err(CaptureError::SourceUnavailable(
                    "webcam thread exited during open".to_string(),
                ));
            }
        };

        info!(
            "Webcam opened: {}x{} @ {} fps, {:?}",
            info.resolution.0, info.resolution.1, info.fps, info.fourcc
        );

        Ok(Self {
            requests: request_tx,
            replies: reply_rx,
            device_thread: Some(device_thread),
            info,
            frame_count: 0,
            active: true,
        })
    }

    /// List available webcam devices.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
            .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|info| format!("{}: {}", info.index(), info.human_name()))
            .collect())
    }
}

fn open_camera(request: CameraRequest) -> Result<(Camera, DeviceInfo), CaptureError> {
    let (width, height) = request.resolution.unwrap_or(DEFAULT_RESOLUTION);
    let frame_format = match request.fourcc {
        Some(FourCC::MJPG) => FrameFormat::MJPEG,
        _ => FrameFormat::YUYV,
    };
    let format = CameraFormat::new(Resolution::new(width, height), frame_format, DEFAULT_FPS);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    let mut camera = Camera::new(CameraIndex::Index(request.index), requested)
        .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;
    camera
        .open_stream()
        .map_err(|e| CaptureError::SourceUnavailable(e.to_string()))?;

    let resolution = camera.resolution();
    let info = DeviceInfo {
        resolution: (resolution.width(), resolution.height()),
        fps: camera.frame_rate(),
        fourcc: fourcc_of(camera.frame_format()),
    };
    Ok((camera, info))
}

fn fourcc_of(format: FrameFormat) -> Option<FourCC> {
    match format {
        FrameFormat::MJPEG => Some(FourCC::MJPG),
        FrameFormat::YUYV => Some(FourCC::YUYV),
        FrameFormat::NV12 => Some(FourCC(*b"NV12")),
        FrameFormat::GRAY => Some(FourCC(*b"GREY")),
        _ => None,
    }
}

fn device_loop(
    camera: &mut Camera,
    requests: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Result<FrameData, CaptureError>>,
) {
    let start_time = Instant::now();
    let mut frame_count = 0u64;

    while let Ok(Request::Pull) = requests.recv() {
        let result = grab(camera).map(|image| {
            let timestamp = start_time.elapsed().as_secs_f64();
            let frame = FrameData::new(image, timestamp, frame_count);
            frame_count += 1;
            frame
        });
        if replies.send(result).is_err() {
            break;
        }
    }
}

fn grab(camera: &mut Camera) -> Result<RgbImage, CaptureError> {
    let frame = camera
        .frame()
        .map_err(|e| CaptureError::ReadFailure(e.to_string()))?;

    let decoded = frame
        .decode_image::<RgbFormat>()
        .map_err(|e| CaptureError::ReadFailure(e.to_string()))?;

    // nokhwa may link a different `image` version, go through raw bytes.
    let (width, height) = (decoded.width(), decoded.height());
    RgbImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| CaptureError::ReadFailure("Failed to create RGB image".to_string()))
}

impl CaptureResource for WebcamCapture {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn backend_name(&self) -> &str {
        "nokhwa"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        if !self.active {
            return Err(CaptureError::Closed);
        }

        // A dead device thread means the camera went away.
        if self.requests.send(Request::Pull).is_err() {
            return Ok(None);
        }
        let Ok(reply) = self.replies.recv() else {
            return Ok(None);
        };
        let frame = reply?;

        self.frame_count += 1;
        debug!("Captured frame {} at {:.3}s", self.frame_count, frame.timestamp);

        Ok(Some(frame))
    }

    fn property(&self, property: Property) -> Option<f64> {
        match property {
            Property::Width => Some(self.info.resolution.0 as f64),
            Property::Height => Some(self.info.resolution.1 as f64),
            Property::Fps => Some(self.info.fps as f64),
            Property::FourCC => self.info.fourcc.map(|code| code.to_u32() as f64),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        self.active
    }

    fn close(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let _ = self.requests.send(Request::Stop);
        if let Some(handle) = self.device_thread.take() {
            if handle.join().is_err() {
                warn!("Webcam device thread panicked");
            }
        }
        info!("Webcam capture stopped after {} frames", self.frame_count);
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        self.close();
    }
}
