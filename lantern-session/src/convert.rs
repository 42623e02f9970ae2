//! Conversion from captured frames to displayable bitmaps.

use image::{DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;

/// A bitmap ready for a display surface.
pub type Bitmap = RgbaImage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Frame is empty")]
    EmptyFrame,

    #[error("Could not convert frame: {0}")]
    Failed(String),
}

/// Turns raw frames into bitmaps. Pure and synchronous.
pub trait BitmapConverter {
    fn convert(&self, frame: &RgbImage) -> Result<Bitmap, ConversionError>;
}

impl<F> BitmapConverter for F
where
    F: Fn(&RgbImage) -> Result<Bitmap, ConversionError>,
{
    fn convert(&self, frame: &RgbImage) -> Result<Bitmap, ConversionError> {
        self(frame)
    }
}

/// Converts RGB frames to opaque RGBA bitmaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RgbaConverter;

impl BitmapConverter for RgbaConverter {
    fn convert(&self, frame: &RgbImage) -> Result<Bitmap, ConversionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ConversionError::EmptyFrame);
        }
        Ok(DynamicImage::ImageRgb8(frame.clone()).into_rgba8())
    }
}
