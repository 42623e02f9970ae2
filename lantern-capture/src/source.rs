//! Common capture resource types and traits.

use crate::fourcc::FourCC;
use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening or reading a capture resource.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to read frame: {0}")]
    ReadFailure(String),

    #[error("Capture resource is closed")]
    Closed,

    #[error("Frame {requested} is out of range (source has {available} frames)")]
    OutOfRange { requested: u64, available: u64 },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The kind of source a resource was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image,
    Video,
    Camera,
    Network,
}

impl SourceKind {
    /// Live sources are read by a background worker and cannot be seeked.
    pub fn is_live(self) -> bool {
        matches!(self, SourceKind::Camera | SourceKind::Network)
    }
}

/// Best-effort format request for a local camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraRequest {
    /// Device index, 0 is the default camera.
    pub index: u32,
    /// Requested (width, height); the device may pick something else.
    pub resolution: Option<(u32, u32)>,
    /// Requested pixel format, e.g. `MJPG`.
    pub fourcc: Option<FourCC>,
}

impl CameraRequest {
    /// Request the default camera with no format hints.
    pub fn default_camera() -> Self {
        Self::default()
    }

    /// Set the device index.
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Set the requested resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }

    /// Set the requested FOURCC.
    pub fn with_fourcc(mut self, fourcc: FourCC) -> Self {
        self.fourcc = Some(fourcc);
        self
    }
}

/// Everything needed to open a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDescriptor {
    Image(PathBuf),
    Video(PathBuf),
    Camera(CameraRequest),
    /// Opaque connection string, e.g. `rtsp://host:554/stream`.
    Network(String),
}

impl SourceDescriptor {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::Image(path.into())
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self::Video(path.into())
    }

    pub fn network(address: impl Into<String>) -> Self {
        Self::Network(address.into())
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceDescriptor::Image(_) => SourceKind::Image,
            SourceDescriptor::Video(_) => SourceKind::Video,
            SourceDescriptor::Camera(_) => SourceKind::Camera,
            SourceDescriptor::Network(_) => SourceKind::Network,
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Image(path) | SourceDescriptor::Video(path) => {
                write!(f, "{}", path.display())
            }
            SourceDescriptor::Camera(request) if request.index == 0 => write!(f, "Default camera"),
            SourceDescriptor::Camera(request) => write!(f, "Camera {}", request.index),
            SourceDescriptor::Network(address) => write!(f, "{address}"),
        }
    }
}

/// Properties a resource may report for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Width,
    Height,
    /// FOURCC packed into a `u32`, see [`FourCC::from_u32`].
    FourCC,
    Fps,
    /// Index of the next frame a pull will return.
    Position,
    PositionMs,
    FrameCount,
    /// Bits per second.
    Bitrate,
}

/// Raw frame data from a capture resource.
#[derive(Debug, Clone)]
pub struct FrameData {
    /// RGB image data.
    pub image: RgbImage,
    /// Frame timestamp in seconds (relative to stream start).
    pub timestamp: f64,
    /// Frame number.
    pub frame_number: u64,
}

impl FrameData {
    /// Create a new frame.
    pub fn new(image: RgbImage, timestamp: f64, frame_number: u64) -> Self {
        Self {
            image,
            timestamp,
            frame_number,
        }
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A handle to an opened frame source.
///
/// A resource is either open or closed. Once closed every pull fails with
/// [`CaptureError::Closed`] and the resource cannot be reopened. Callers
/// must never close a resource while a pull on it is in progress; the
/// session layer guarantees this by moving the resource into whichever
/// context currently pulls from it.
pub trait CaptureResource: Send {
    /// The kind of source this resource reads from.
    fn kind(&self) -> SourceKind;

    /// Name of the library or device backend serving the frames.
    fn backend_name(&self) -> &str;

    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError>;

    /// Position the resource so the next pull returns frame `frame`.
    ///
    /// Live sources ignore this.
    fn seek(&mut self, _frame: u64) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Whether [`CaptureResource::seek`] has any effect.
    fn is_seekable(&self) -> bool {
        false
    }

    /// Read a property. `None` means the value is unknown.
    fn property(&self, property: Property) -> Option<f64>;

    /// Request a property change. Returns whether the resource accepted it.
    fn set_property(&mut self, _property: Property, _value: f64) -> bool {
        false
    }

    /// Check if the resource can still be pulled from.
    fn is_open(&self) -> bool;

    /// Release the underlying handle. Safe to call more than once.
    fn close(&mut self);
}

impl<R: CaptureResource + ?Sized> CaptureResource for Box<R> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        (**self).pull_frame()
    }

    fn seek(&mut self, frame: u64) -> Result<(), CaptureError> {
        (**self).seek(frame)
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn property(&self, property: Property) -> Option<f64> {
        (**self).property(property)
    }

    fn set_property(&mut self, property: Property, value: f64) -> bool {
        (**self).set_property(property, value)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
