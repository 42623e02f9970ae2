//! The state of the one active viewing session.

use crate::delivery::Generation;
use crate::worker::WorkerHandle;
use lantern_capture::{CaptureResource, FourCC, Property};
use std::fmt;

/// What the session is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Empty,
    Image,
    Video,
    LiveCamera,
    NetworkCamera,
}

impl Mode {
    /// Modes fed by an acquisition worker.
    pub fn is_live(self) -> bool {
        matches!(self, Mode::LiveCamera | Mode::NetworkCamera)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Empty => "Empty",
            Mode::Image => "Image",
            Mode::Video => "Video",
            Mode::LiveCamera => "Camera",
            Mode::NetworkCamera => "Network camera",
        };
        f.write_str(name)
    }
}

/// Properties captured from a resource before a worker took it over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceProperties {
    pub backend: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub fourcc: Option<FourCC>,
    pub fps: Option<f64>,
}

impl SourceProperties {
    pub fn read(resource: &dyn CaptureResource) -> Self {
        Self {
            backend: resource.backend_name().to_string(),
            width: resource.property(Property::Width),
            height: resource.property(Property::Height),
            fourcc: resource
                .property(Property::FourCC)
                .and_then(FourCC::from_property),
            fps: resource.property(Property::Fps),
        }
    }
}

/// The active session. Only the session controller mutates it.
pub struct Session {
    pub(crate) mode: Mode,
    pub(crate) source_name: String,
    pub(crate) current_frame: u64,
    pub(crate) frame_count: Option<u64>,
    pub(crate) generation: Generation,
    pub(crate) properties: Option<SourceProperties>,
    pub(crate) resource: Option<Box<dyn CaptureResource>>,
    pub(crate) worker: Option<WorkerHandle>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            mode: Mode::Empty,
            source_name: String::new(),
            current_frame: 0,
            frame_count: None,
            generation: Generation::default(),
            properties: None,
            resource: None,
            worker: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Path, address, or device name of the source.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Last frame shown from a video.
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    /// Whether the mode agrees with the resources held.
    ///
    /// Live sessions keep their resource inside the worker.
    pub fn is_consistent(&self) -> bool {
        match self.mode {
            Mode::Empty | Mode::Image => self.resource.is_none() && self.worker.is_none(),
            Mode::Video => self.resource.is_some() && self.worker.is_none(),
            Mode::LiveCamera | Mode::NetworkCamera => {
                self.resource.is_none() && self.worker.is_some()
            }
        }
    }
}
