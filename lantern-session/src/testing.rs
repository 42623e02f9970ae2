//! Instrumented capture resources for tests.

use lantern_capture::{CaptureError, CaptureResource, FrameData, Property, SourceKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct TrackerState {
    pulls: AtomicU64,
    in_pull: AtomicBool,
    closed: AtomicBool,
    pulled_after_close: AtomicBool,
    closed_during_pull: AtomicBool,
    pull_delay_us: AtomicU64,
}

/// Shared view of what happened to a [`TrackedResource`].
#[derive(Clone, Default)]
pub struct Tracker(Arc<TrackerState>);

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulls(&self) -> u64 {
        self.0.pulls.load(Ordering::SeqCst)
    }

    pub fn in_pull(&self) -> bool {
        self.0.in_pull.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    pub fn pulled_after_close(&self) -> bool {
        self.0.pulled_after_close.load(Ordering::SeqCst)
    }

    pub fn closed_during_pull(&self) -> bool {
        self.0.closed_during_pull.load(Ordering::SeqCst)
    }

    /// Make every following pull take at least `delay`.
    pub fn set_pull_delay(&self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.0.pull_delay_us.store(micros, Ordering::SeqCst);
    }
}

/// Wraps a resource and records pulls and closes.
pub struct TrackedResource {
    inner: Box<dyn CaptureResource>,
    tracker: Tracker,
    fail_after: Option<u64>,
    kind: Option<SourceKind>,
}

impl TrackedResource {
    pub fn new(inner: impl CaptureResource + 'static, tracker: &Tracker) -> Self {
        Self {
            inner: Box::new(inner),
            tracker: tracker.clone(),
            fail_after: None,
            kind: None,
        }
    }

    /// Every pull after the first `count` fails with a read error.
    pub fn failing_after(mut self, count: u64) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Report a different source kind than the wrapped resource.
    pub fn as_kind(mut self, kind: SourceKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl CaptureResource for TrackedResource {
    fn kind(&self) -> SourceKind {
        self.kind.unwrap_or_else(|| self.inner.kind())
    }

    fn backend_name(&self) -> &str {
        "tracked"
    }

    fn pull_frame(&mut self) -> Result<Option<FrameData>, CaptureError> {
        let state = &self.tracker.0;
        if state.closed.load(Ordering::SeqCst) {
            state.pulled_after_close.store(true, Ordering::SeqCst);
            return Err(CaptureError::Closed);
        }

        state.in_pull.store(true, Ordering::SeqCst);
        let pulls = state.pulls.fetch_add(1, Ordering::SeqCst);
        let delay = state.pull_delay_us.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_micros(delay));
        }
        let result = if self.fail_after.is_some_and(|limit| pulls >= limit) {
            thread::sleep(Duration::from_millis(1));
            Err(CaptureError::ReadFailure("simulated hiccup".to_string()))
        } else {
            self.inner.pull_frame()
        };
        state.in_pull.store(false, Ordering::SeqCst);
        result
    }

    fn seek(&mut self, frame: u64) -> Result<(), CaptureError> {
        self.inner.seek(frame)
    }

    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn property(&self, property: Property) -> Option<f64> {
        self.inner.property(property)
    }

    fn set_property(&mut self, property: Property, value: f64) -> bool {
        self.inner.set_property(property, value)
    }

    fn is_open(&self) -> bool {
        !self.tracker.is_closed() && self.inner.is_open()
    }

    fn close(&mut self) {
        let state = &self.tracker.0;
        if state.in_pull.load(Ordering::SeqCst) {
            state.closed_during_pull.store(true, Ordering::SeqCst);
        }
        state.closed.store(true, Ordering::SeqCst);
        self.inner.close();
    }
}
