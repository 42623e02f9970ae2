//! Background acquisition loop.
//!
//! The worker takes ownership of a capture resource, pulls frames on its own
//! thread, and posts each one to a [`DeliverySink`] without waiting for it to
//! be consumed. Cancellation is checked between pulls only, never during one.
//! [`WorkerHandle::cancel`] joins the thread and hands the resource back, so
//! the caller can close it knowing no pull is in flight.

use crate::delivery::{Delivery, Envelope, Frame, Generation};
use crate::slot::{SlotClosed, SlotSender};
use lantern_capture::CaptureResource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors from starting or joining a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Capture resource is not open")]
    ResourceClosed,

    #[error("Could not create the acquisition thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Acquisition thread panicked")]
    Panicked,
}

/// Where the worker posts its deliveries.
pub trait DeliverySink: Send + 'static {
    /// Hand over an envelope without blocking on the consumer.
    fn deliver(&self, envelope: Envelope) -> Result<(), SlotClosed>;
}

impl DeliverySink for SlotSender<Envelope> {
    fn deliver(&self, envelope: Envelope) -> Result<(), SlotClosed> {
        self.post(envelope).map(|_| ())
    }
}

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Cancelling,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Cancelling,
            _ => WorkerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Running => 1,
            WorkerState::Cancelling => 2,
            WorkerState::Stopped => 3,
        }
    }
}

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Give up after this many read failures in a row. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
    /// Pause between a failed pull and the next attempt.
    pub failure_backoff: Duration,
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: Some(100),
            failure_backoff: Duration::from_millis(10),
            thread_name: "lantern-acquisition".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_max_consecutive_failures(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}

#[derive(Default)]
struct Shared {
    state: AtomicU8,
    cancel: AtomicBool,
    frames: AtomicU64,
    failures: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// A worker that has not been started yet.
pub struct AcquisitionWorker {
    config: WorkerConfig,
    shared: Arc<Shared>,
}

impl AcquisitionWorker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Move `resource` onto a new thread and start pulling.
    ///
    /// Every delivery is tagged with `generation`.
    pub fn start<S: DeliverySink>(
        self,
        mut resource: Box<dyn CaptureResource>,
        sink: S,
        generation: Generation,
    ) -> Result<WorkerHandle, WorkerError> {
        if !resource.is_open() {
            return Err(WorkerError::ResourceClosed);
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config;
        shared.set_state(WorkerState::Running);

        let thread_shared = Arc::clone(&shared);
        let thread_config = config.clone();
        let spawned = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                acquisition_loop(
                    resource.as_mut(),
                    &sink,
                    generation,
                    &thread_shared,
                    &thread_config,
                );
                thread_shared.set_state(WorkerState::Stopped);
                resource
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                shared.set_state(WorkerState::Stopped);
                return Err(WorkerError::Spawn(e));
            }
        };

        info!("Acquisition worker started (generation {})", generation.value());

        Ok(WorkerHandle {
            shared,
            thread: Some(thread),
            generation,
        })
    }
}

impl Default for AcquisitionWorker {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

fn acquisition_loop<S: DeliverySink>(
    resource: &mut dyn CaptureResource,
    sink: &S,
    generation: Generation,
    shared: &Shared,
    config: &WorkerConfig,
) {
    let mut consecutive_failures = 0u32;

    // Checkpoint: cancellation is only observed here, between pulls.
    while !shared.cancel.load(Ordering::Acquire) {
        let started = Instant::now();
        match resource.pull_frame() {
            Ok(Some(data)) => {
                consecutive_failures = 0;
                let count = shared.frames.fetch_add(1, Ordering::Relaxed) + 1;
                let frame = Frame::new(data, started.elapsed());
                if count % 100 == 0 {
                    debug!("Worker pulled {} frames", count);
                }
                if sink
                    .deliver(Envelope::new(generation, Delivery::Frame(frame)))
                    .is_err()
                {
                    debug!("Delivery sink closed, stopping worker");
                    break;
                }
            }
            Ok(None) => {
                info!("Source exhausted after {} frames", shared.frames.load(Ordering::Relaxed));
                let _ = sink.deliver(Envelope::new(generation, Delivery::SourceEnded));
                break;
            }
            Err(e) => {
                shared.failures.fetch_add(1, Ordering::Relaxed);
                consecutive_failures += 1;
                warn!("Frame pull failed ({} in a row): {}", consecutive_failures, e);

                if config
                    .max_consecutive_failures
                    .is_some_and(|limit| consecutive_failures >= limit)
                {
                    error!(
                        "Giving up after {} consecutive read failures",
                        consecutive_failures
                    );
                    let _ = sink.deliver(Envelope::new(generation, Delivery::SourceEnded));
                    break;
                }
                if !config.failure_backoff.is_zero() {
                    thread::sleep(config.failure_backoff);
                }
            }
        }
    }
}

/// Ownership token for a running worker.
///
/// Dropping the handle cancels the worker and closes its resource.
pub struct WorkerHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Box<dyn CaptureResource>>>,
    generation: Generation,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Frames pulled successfully so far.
    pub fn frames_pulled(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Failed pulls so far.
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    /// Whether the loop has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop the loop at its next checkpoint and wait for the thread to exit.
    ///
    /// Blocks for at most one pull. Returns the resource, still open, so the
    /// caller decides when to close it.
    pub fn cancel(mut self) -> Result<Box<dyn CaptureResource>, WorkerError> {
        self.join()
    }

    fn join(&mut self) -> Result<Box<dyn CaptureResource>, WorkerError> {
        if self.shared.state() == WorkerState::Running {
            self.shared.set_state(WorkerState::Cancelling);
        }
        self.shared.cancel.store(true, Ordering::Release);

        let thread = self.thread.take().ok_or(WorkerError::Panicked)?;
        let joined = thread.join();
        self.shared.set_state(WorkerState::Stopped);

        match joined {
            Ok(resource) => {
                info!(
                    "Acquisition worker stopped (generation {}, {} frames)",
                    self.generation.value(),
                    self.frames_pulled()
                );
                Ok(resource)
            }
            Err(_) => {
                error!("Acquisition worker panicked");
                Err(WorkerError::Panicked)
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Ok(mut resource) = self.join() {
                resource.close();
            }
        }
    }
}
