//! In-memory and generated sources.

use crate::source::{CaptureError, CaptureResource, FrameData, Property, SourceKind};
use image::{Rgb, RgbImage};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A seekable, file-like source backed by frames held in memory.
pub struct FrameSequence {
    frames: Vec<RgbImage>,
    fps: f64,
    position: u64,
    open: bool,
}

impl FrameSequence {
    /// Create a sequence playing at `fps`.
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            position: 0,
            open: true,
        }
    }

    /// Create `count` solid frames whose colour encodes their index.
    pub fn numbered(count: u64, width: u32, height: u32) -> Self {
        let frames = (0..count)
            .map(|n| RgbImage::from_pixel(width, height, index_colour(n)))
            .collect();
        Self::new(frames, 25.0)
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Colour used by [`FrameSequence::numbered`] for frame `n`.
pub fn index_colour(n: u64) -> Rgb<u8> {
    Rgb([(n & 0xFF) as u8, ((n >> 8) & 0xFF) as u8, 0x80])
}

impl CaptureResource for FrameSequence {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn backend_name(&self) -> &str {
        "memory"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        let Some(image) = self.frames.get(self.position as usize) else {
            return Ok(None);
        };
        let frame_number = self.position;
        let timestamp = if self.fps > 0.0 {
            frame_number as f64 / self.fps
        } else {
            0.0
        };
        self.position += 1;
        Ok(Some(FrameData::new(image.clone(), timestamp, frame_number)))
    }

    fn seek(&mut self, frame: u64) -> Result<(), CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        if frame >= self.len() {
            return Err(CaptureError::OutOfRange {
                requested: frame,
                available: self.len(),
            });
        }
        self.position = frame;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn property(&self, property: Property) -> Option<f64> {
        let first = self.frames.first();
        match property {
            Property::Width => first.map(|f| f.width() as f64),
            Property::Height => first.map(|f| f.height() as f64),
            Property::Fps => Some(self.fps),
            Property::Position => Some(self.position as f64),
            Property::PositionMs if self.fps > 0.0 => {
                Some(self.position as f64 * 1000.0 / self.fps)
            }
            Property::FrameCount => Some(self.len() as f64),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// A live source producing a moving gradient at a fixed rate.
///
/// Useful for exercising the acquisition pipeline without a device.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: f64,
    limit: Option<u64>,
    frame_count: u64,
    start_time: Instant,
    last_frame: Option<Instant>,
    open: bool,
}

impl SyntheticCamera {
    /// Create a camera producing `width`x`height` frames at `fps`.
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        info!("Opening synthetic camera at {}x{} @ {} fps", width, height, fps);
        Self {
            width: width.max(1),
            height: height.max(1),
            fps,
            limit: None,
            frame_count: 0,
            start_time: Instant::now(),
            last_frame: None,
            open: true,
        }
    }

    /// Report end of stream after `limit` frames, like an unplugged device.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn render(&self) -> RgbImage {
        let width = u64::from(self.width.max(1));
        let height = u64::from(self.height.max(1));
        let shift = self.frame_count % width;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let column = (u64::from(x) + shift) % width;
            let r = (column * 255 / width) as u8;
            let g = (u64::from(y) * 255 / height) as u8;
            Rgb([r, g, (self.frame_count % 256) as u8])
        })
    }

    fn frame_interval(&self) -> Option<Duration> {
        (self.fps > 0.0).then(|| Duration::from_secs_f64(1.0 / self.fps))
    }
}

impl CaptureResource for SyntheticCamera {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn backend_name(&self) -> &str {
        "synthetic"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Closed);
        }
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }

        // Pace like a real device.
        if let (Some(interval), Some(last)) = (self.frame_interval(), self.last_frame) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let image = self.render();
        let timestamp = self.start_time.elapsed().as_secs_f64();
        let frame_number = self.frame_count;
        self.frame_count += 1;

        debug!("Synthesized frame {} at {:.3}s", frame_number, timestamp);

        Ok(Some(FrameData::new(image, timestamp, frame_number)))
    }

    fn property(&self, property: Property) -> Option<f64> {
        match property {
            Property::Width => Some(self.width as f64),
            Property::Height => Some(self.height as f64),
            Property::Fps => Some(self.fps),
            _ => None,
        }
    }

    fn set_property(&mut self, property: Property, value: f64) -> bool {
        if !value.is_finite() || value < 1.0 {
            return false;
        }
        match property {
            Property::Width => self.width = value as u32,
            Property::Height => self.height = value as u32,
            Property::Fps => self.fps = value,
            _ => return false,
        }
        true
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            info!("Synthetic camera stopped after {} frames", self.frame_count);
        }
        self.open = false;
    }
}
