//! Still image source.

use crate::source::{CaptureError, CaptureResource, FrameData, Property, SourceKind};
use image::RgbImage;
use std::path::Path;
use tracing::{debug, info};

/// A single decoded image exposed as a one-frame source.
///
/// The first pull yields the image, every later pull reports the end of
/// the stream. Seeking to frame 0 rewinds.
pub struct StillImage {
    image: Option<RgbImage>,
    dimensions: (u32, u32),
    delivered: bool,
}

impl StillImage {
    /// Decode an image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        info!("Opening image {}", path.display());

        let decoded = image::open(path).map_err(|e| {
            CaptureError::SourceUnavailable(format!(
                "could not read image '{}': {e}",
                path.display()
            ))
        })?;

        Ok(Self::from_image(decoded.into_rgb8()))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: RgbImage) -> Self {
        let dimensions = image.dimensions();
        Self {
            image: Some(image),
            dimensions,
            delivered: false,
        }
    }
}

impl CaptureResource for StillImage {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn backend_name(&self) -> &str {
        "image"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        let image = self.image.as_ref().ok_or(CaptureError::Closed)?;
        if self.delivered {
            return Ok(None);
        }
        self.delivered = true;
        debug!("Delivering still image {}x{}", image.width(), image.height());
        Ok(Some(FrameData::new(image.clone(), 0.0, 0)))
    }

    fn seek(&mut self, frame: u64) -> Result<(), CaptureError> {
        if self.image.is_none() {
            return Err(CaptureError::Closed);
        }
        if frame > 0 {
            return Err(CaptureError::OutOfRange {
                requested: frame,
                available: 1,
            });
        }
        self.delivered = false;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn property(&self, property: Property) -> Option<f64> {
        match property {
            Property::Width => Some(self.dimensions.0 as f64),
            Property::Height => Some(self.dimensions.1 as f64),
            Property::FrameCount => Some(1.0),
            Property::Position => Some(if self.delivered { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        self.image.is_some()
    }

    fn close(&mut self) {
        self.image = None;
    }
}
