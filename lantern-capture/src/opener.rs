//! Turning source descriptors into capture resources.

use crate::ffmpeg::FfmpegCapture;
use crate::source::{CaptureError, CaptureResource, SourceDescriptor};
use crate::still::StillImage;

/// Opens capture resources for a session.
///
/// An opener either returns an open resource or an error; it never leaves
/// a half-opened resource behind.
pub trait SourceOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn CaptureResource>, CaptureError>;
}

impl<F> SourceOpener for F
where
    F: Fn(&SourceDescriptor) -> Result<Box<dyn CaptureResource>, CaptureError>,
{
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn CaptureResource>, CaptureError> {
        self(descriptor)
    }
}

/// Opens sources with the backends compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SourceOpener for SystemOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn CaptureResource>, CaptureError> {
        match descriptor {
            SourceDescriptor::Image(path) => Ok(Box::new(StillImage::open(path)?)),
            SourceDescriptor::Video(path) => Ok(Box::new(FfmpegCapture::open_file(path)?)),
            SourceDescriptor::Network(address) => {
                Ok(Box::new(FfmpegCapture::open_stream(address)?))
            }
            #[cfg(feature = "webcam")]
            SourceDescriptor::Camera(request) => {
                Ok(Box::new(crate::webcam::WebcamCapture::open(*request)?))
            }
            #[cfg(not(feature = "webcam"))]
            SourceDescriptor::Camera(_) => Err(CaptureError::SourceUnavailable(
                "camera support is not compiled in (enable the `webcam` feature)".to_string(),
            )),
        }
    }
}
