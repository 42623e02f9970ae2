//! Display surfaces the presenter paints on.

use crate::convert::Bitmap;
use image::{Rgba, RgbaImage, imageops};
use std::path::Path;

/// Text colour and size for the timing overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub colour: Rgba<u8>,
    pub font_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            colour: Rgba([0, 255, 0, 255]),
            font_size: 14.0,
        }
    }
}

/// A scrollable drawing target.
///
/// Positions are in virtual (content) coordinates; the surface maps them
/// through its current scroll offset.
pub trait DisplaySurface {
    /// Fill the visible area with the background.
    fn clear(&mut self);

    fn draw_bitmap(&mut self, bitmap: &Bitmap, at: (u32, u32));

    fn draw_text(&mut self, text: &str, at: (u32, u32), style: &OverlayStyle);

    /// Size of the visible area in pixels.
    fn visible_size(&self) -> (u32, u32);

    /// Virtual coordinate shown at the top left of the visible area.
    fn scroll_offset(&self) -> (u32, u32);
}

/// A line of overlay text, in viewport coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub position: (i64, i64),
    pub style: OverlayStyle,
}

/// An in-memory surface: a viewport-sized RGBA canvas plus recorded text.
///
/// Text is recorded rather than rasterised, so [`CanvasSurface::save`] writes
/// the bitmap only. Read the text back with [`CanvasSurface::overlay_text`].
pub struct CanvasSurface {
    canvas: RgbaImage,
    scroll: (u32, u32),
    background: Rgba<u8>,
    text: Vec<TextRun>,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let background = Rgba([0, 0, 0, 255]);
        Self {
            canvas: RgbaImage::from_pixel(width.max(1), height.max(1), background),
            scroll: (0, 0),
            background,
            text: Vec::new(),
        }
    }

    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self.clear();
        self
    }

    pub fn scroll_to(&mut self, x: u32, y: u32) {
        self.scroll = (x, y);
    }

    /// Resize the visible area, e.g. to fit the content.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::from_pixel(width.max(1), height.max(1), self.background);
        self.text.clear();
    }

    /// Pixels currently visible.
    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text
    }

    /// All recorded overlay text, one run per line.
    pub fn overlay_text(&self) -> String {
        self.text
            .iter()
            .map(|run| run.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
        self.canvas.save(path)
    }

    fn to_viewport(&self, at: (u32, u32)) -> (i64, i64) {
        (
            at.0 as i64 - self.scroll.0 as i64,
            at.1 as i64 - self.scroll.1 as i64,
        )
    }
}

impl DisplaySurface for CanvasSurface {
    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = self.background;
        }
        self.text.clear();
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, at: (u32, u32)) {
        let (x, y) = self.to_viewport(at);
        imageops::overlay(&mut self.canvas, bitmap, x, y);
    }

    fn draw_text(&mut self, text: &str, at: (u32, u32), style: &OverlayStyle) {
        let position = self.to_viewport(at);
        let line_height = style.font_size.ceil().max(1.0) as i64;
        for (i, line) in text.lines().enumerate() {
            self.text.push(TextRun {
                text: line.to_string(),
                position: (position.0, position.1 + i as i64 * line_height),
                style: *style,
            });
        }
    }

    fn visible_size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn scroll_offset(&self) -> (u32, u32) {
        self.scroll
    }
}
