//! Lantern Session - Frame delivery between capture and display
//!
//! A session owns at most one source. Still images and videos are pulled on
//! demand from the caller's thread; live cameras are pulled by an
//! [`AcquisitionWorker`] on a background thread that hands frames to the
//! [`Presenter`] through a single-slot, latest-wins mailbox.
//!
//! ## Example
//!
//! ```ignore
//! use lantern_session::{CanvasSurface, SessionController};
//! use std::time::Duration;
//!
//! let mut controller = SessionController::system();
//! controller.open_video("clip.mp4")?;
//! controller.seek(120)?;
//!
//! let mut surface = CanvasSurface::new(640, 480);
//! controller.render(&mut surface);
//! ```

mod controller;
mod convert;
mod delivery;
mod error;
mod presenter;
mod session;
mod slot;
mod surface;
mod worker;

#[cfg(test)]
mod testing;

pub use controller::{Notice, SessionConfig, SessionController, SessionControllerBuilder};
pub use convert::{Bitmap, BitmapConverter, ConversionError, RgbaConverter};
pub use delivery::{Delivery, Envelope, Frame, Generation};
pub use error::SessionError;
pub use presenter::{FrameTimings, Presenter, RenderStats, overlay_text};
pub use session::{Mode, Session, SourceProperties};
pub use slot::{Posted, SlotClosed, SlotReceiver, SlotSender, SlotStats, latest_slot, latest_slot_with_waker};
pub use surface::{CanvasSurface, DisplaySurface, OverlayStyle, TextRun};
pub use worker::{AcquisitionWorker, DeliverySink, WorkerConfig, WorkerError, WorkerHandle, WorkerState};
