//! The single-threaded consumer that turns delivered frames into pixels.
//!
//! The presenter keeps exactly one current frame. Whatever arrives replaces
//! it; there is no queue.

use crate::convert::{Bitmap, BitmapConverter, ConversionError, RgbaConverter};
use crate::delivery::{Delivery, Frame};
use crate::surface::{DisplaySurface, OverlayStyle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

const MAX_BEST_SIZE: (u32, u32) = (800, 600);
const EMPTY_BEST_SIZE: (u32, u32) = (64, 48);

/// How long it took to get the current frame on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimings {
    pub acquire: Duration,
    pub convert: Duration,
}

/// Result of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub frame_number: u64,
    pub draw: Duration,
}

struct Shown {
    bitmap: Bitmap,
    frame_number: u64,
    timestamp: f64,
    timings: FrameTimings,
}

pub struct Presenter {
    converter: Box<dyn BitmapConverter>,
    current: Option<Shown>,
    exhausted: bool,
    style: OverlayStyle,
    frames_shown: u64,
    conversion_failures: u64,
}

impl Presenter {
    pub fn new() -> Self {
        Self::with_converter(RgbaConverter)
    }

    pub fn with_converter(converter: impl BitmapConverter + 'static) -> Self {
        Self {
            converter: Box::new(converter),
            current: None,
            exhausted: false,
            style: OverlayStyle::default(),
            frames_shown: 0,
            conversion_failures: 0,
        }
    }

    /// Handle a delivery from the acquisition worker.
    pub fn receive(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Frame(frame) => {
                let frame_number = frame.frame_number();
                if let Err(e) = self.show(frame) {
                    error!("Could not convert frame {}: {}", frame_number, e);
                }
            }
            Delivery::SourceEnded => {
                self.current = None;
                self.exhausted = true;
            }
        }
    }

    /// Convert and store `frame` as the current frame.
    ///
    /// On failure nothing is shown, rather than the previous frame.
    pub fn show(&mut self, frame: Frame) -> Result<(), ConversionError> {
        let started = Instant::now();
        let converted = self.converter.convert(frame.image());
        let convert = started.elapsed();

        match converted {
            Ok(bitmap) => {
                debug!(
                    "Showing frame {} ({}x{})",
                    frame.frame_number(),
                    bitmap.width(),
                    bitmap.height()
                );
                self.current = Some(Shown {
                    bitmap,
                    frame_number: frame.frame_number(),
                    timestamp: frame.data.timestamp,
                    timings: FrameTimings {
                        acquire: frame.acquire_time,
                        convert,
                    },
                });
                self.exhausted = false;
                self.frames_shown += 1;
                Ok(())
            }
            Err(e) => {
                self.current = None;
                self.conversion_failures += 1;
                Err(e)
            }
        }
    }

    /// Show nothing.
    pub fn clear(&mut self) {
        self.current = None;
        self.exhausted = false;
    }

    /// Paint the current frame and its timing overlay.
    ///
    /// The overlay is anchored to the scroll origin so it stays in the top
    /// left corner of the visible area.
    pub fn render(&self, surface: &mut dyn DisplaySurface) -> Option<RenderStats> {
        surface.clear();
        let shown = self.current.as_ref()?;

        let started = Instant::now();
        surface.draw_bitmap(&shown.bitmap, (0, 0));
        let draw = started.elapsed();

        let text = overlay_text(&shown.timings, draw);
        let origin = surface.scroll_offset();
        surface.draw_text(&text, origin, &self.style);

        Some(RenderStats {
            frame_number: shown.frame_number,
            draw,
        })
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        self.current.as_ref().map(|s| &s.bitmap)
    }

    pub fn has_frame(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_frame_number(&self) -> Option<u64> {
        self.current.as_ref().map(|s| s.frame_number)
    }

    /// Stream timestamp of the current frame, in seconds.
    pub fn current_timestamp(&self) -> Option<f64> {
        self.current.as_ref().map(|s| s.timestamp)
    }

    pub fn timings(&self) -> Option<FrameTimings> {
        self.current.as_ref().map(|s| s.timings)
    }

    /// Whether the last live source reported its end.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Frames successfully stored since creation.
    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn conversion_failures(&self) -> u64 {
        self.conversion_failures
    }

    pub fn overlay_style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn set_overlay_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    /// Size of the content: the bitmap, or 1x1 when empty.
    pub fn virtual_size(&self) -> (u32, u32) {
        self.bitmap()
            .map(|b| b.dimensions())
            .unwrap_or((1, 1))
    }

    /// Preferred visible size for the current content.
    pub fn best_client_size(&self) -> (u32, u32) {
        match self.bitmap() {
            Some(b) => (
                b.width().min(MAX_BEST_SIZE.0),
                b.height().min(MAX_BEST_SIZE.1),
            ),
            None => EMPTY_BEST_SIZE,
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// The timing overlay shown over every frame.
pub fn overlay_text(timings: &FrameTimings, draw: Duration) -> String {
    format!(
        "Acquire frame: {} ms\nConvert to bitmap: {} ms\nDraw bitmap: {} ms",
        timings.acquire.as_millis(),
        timings.convert.as_millis(),
        draw.as_millis()
    )
}
