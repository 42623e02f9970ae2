//! Frames and the messages that carry them to the presenter.

use lantern_capture::FrameData;
use image::RgbImage;
use std::time::Duration;

/// Identifies one session lifetime. Bumped every time the session is cleared,
/// so deliveries from an earlier session can be recognised and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// An acquired frame together with how long the pull took.
#[derive(Debug)]
pub struct Frame {
    pub data: FrameData,
    pub acquire_time: Duration,
}

impl Frame {
    pub fn new(data: FrameData, acquire_time: Duration) -> Self {
        Self { data, acquire_time }
    }

    pub fn image(&self) -> &RgbImage {
        &self.data.image
    }

    pub fn frame_number(&self) -> u64 {
        self.data.frame_number
    }
}

/// What the acquisition worker hands to the presenter.
#[derive(Debug)]
pub enum Delivery {
    Frame(Frame),
    /// The source stopped producing frames; sent once, last.
    SourceEnded,
}

/// A delivery tagged with the session generation that produced it.
#[derive(Debug)]
pub struct Envelope {
    pub generation: Generation,
    pub delivery: Delivery,
}

impl Envelope {
    pub fn new(generation: Generation, delivery: Delivery) -> Self {
        Self {
            generation,
            delivery,
        }
    }
}
