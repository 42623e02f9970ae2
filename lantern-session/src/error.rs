//! Error types for session operations.

use crate::convert::ConversionError;
use crate::session::Mode;
use crate::worker::WorkerError;
use lantern_capture::CaptureError;
use thiserror::Error;

/// Errors that can occur while driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] CaptureError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Cannot seek in {0} mode")]
    NotSeekable(Mode),

    #[error("Could not retrieve frame {frame}")]
    FrameUnavailable { frame: u64 },
}

impl SessionError {
    /// Whether the source could not be opened at all.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, SessionError::Source(CaptureError::SourceUnavailable(_)))
    }
}
