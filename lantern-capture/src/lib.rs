//! Lantern Capture - Frame sources for the Lantern viewer
//!
//! This crate provides implementations of the `CaptureResource` trait for
//! pulling frames from the sources a viewer session can open:
//!
//! - Still images (via the `image` crate)
//! - Video files and network streams (via `ffmpeg`/`ffprobe` subprocesses)
//! - Webcams (via nokhwa, requires `webcam` feature)
//! - In-memory sequences and a synthetic camera, for tests and demos
//!
//! ## Example
//!
//! ```ignore
//! use lantern_capture::{CaptureResource, SourceDescriptor, SourceOpener, SystemOpener};
//!
//! let mut video = SystemOpener::default().open(&SourceDescriptor::video("clip.mp4"))?;
//! video.seek(42)?;
//! if let Some(frame) = video.pull_frame()? {
//!     // Process frame...
//! }
//! video.close();
//! ```

mod ffmpeg;
mod fourcc;
mod opener;
mod sequence;
mod source;
mod still;

#[cfg(feature = "webcam")]
mod webcam;

pub use ffmpeg::{FfmpegCapture, FfmpegTools, ProbeInfo};
pub use fourcc::FourCC;
pub use opener::{SourceOpener, SystemOpener};
pub use sequence::{FrameSequence, SyntheticCamera};
pub use source::{
    CameraRequest, CaptureError, CaptureResource, FrameData, Property, SourceDescriptor,
    SourceKind,
};
pub use still::StillImage;

#[cfg(feature = "webcam")]
pub use webcam::WebcamCapture;
