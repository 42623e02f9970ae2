//! Single-slot, latest-wins mailbox between the acquisition thread and the
//! UI context.
//!
//! Posting never blocks on the consumer. A value posted while another is
//! still pending replaces it; the superseded value is dropped on the
//! posting side. Each posted value is moved in once and moved out at most
//! once, so ownership of a frame crosses the thread boundary exactly once.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

type Waker = Box<dyn Fn() + Send + Sync>;

struct State<T> {
    pending: Option<T>,
    posted: u64,
    superseded: u64,
    receiver_alive: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    waker: Option<Waker>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of a successful post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posted {
    /// The slot was empty.
    Fresh,
    /// A pending value was replaced and dropped.
    Superseded,
}

/// The receiving side is gone; the value was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("delivery slot receiver dropped")]
pub struct SlotClosed;

/// Counters for a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub posted: u64,
    pub superseded: u64,
}

/// Create a slot.
pub fn latest_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    build(None)
}

/// Create a slot that calls `waker` after every post, e.g. to request a
/// repaint from the UI toolkit.
pub fn latest_slot_with_waker<T, W>(waker: W) -> (SlotSender<T>, SlotReceiver<T>)
where
    W: Fn() + Send + Sync + 'static,
{
    build(Some(Box::new(waker)))
}

fn build<T>(waker: Option<Waker>) -> (SlotSender<T>, SlotReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            pending: None,
            posted: 0,
            superseded: 0,
            receiver_alive: true,
        }),
        ready: Condvar::new(),
        waker,
    });
    (
        SlotSender {
            shared: Arc::clone(&shared),
        },
        SlotReceiver { shared },
    )
}

/// Posting half. Cheap to clone.
pub struct SlotSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SlotSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> SlotSender<T> {
    /// Store `value` as the pending delivery without waiting for the consumer.
    pub fn post(&self, value: T) -> Result<Posted, SlotClosed> {
        let superseded = {
            let mut state = self.shared.lock();
            if !state.receiver_alive {
                return Err(SlotClosed);
            }
            state.posted += 1;
            let previous = state.pending.replace(value);
            if previous.is_some() {
                state.superseded += 1;
            }
            previous
        };
        self.shared.ready.notify_one();
        if let Some(waker) = &self.shared.waker {
            waker();
        }

        // Dropped outside the lock.
        Ok(match superseded {
            Some(_) => Posted::Superseded,
            None => Posted::Fresh,
        })
    }

    /// Whether the receiver still exists.
    pub fn is_closed(&self) -> bool {
        !self.shared.lock().receiver_alive
    }
}

/// Receiving half, owned by the UI context.
pub struct SlotReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotReceiver<T> {
    /// Take the pending value, if any.
    pub fn take(&self) -> Option<T> {
        self.shared.lock().pending.take()
    }

    /// Wait up to `timeout` for a value.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        loop {
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .shared
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Drop whatever is pending. Returns whether something was discarded.
    pub fn drain(&self) -> bool {
        let discarded = self.shared.lock().pending.take();
        discarded.is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    pub fn stats(&self) -> SlotStats {
        let state = self.shared.lock();
        SlotStats {
            posted: state.posted,
            superseded: state.superseded,
        }
    }
}

impl<T> Drop for SlotReceiver<T> {
    fn drop(&mut self) {
        let pending = {
            let mut state = self.shared.lock();
            state.receiver_alive = false;
            state.pending.take()
        };
        drop(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_latest_value_wins() {
        let (tx, rx) = latest_slot();
        assert_eq!(tx.post(1), Ok(Posted::Fresh));
        assert_eq!(tx.post(2), Ok(Posted::Superseded));
        assert_eq!(tx.post(3), Ok(Posted::Superseded));

        assert_eq!(rx.take(), Some(3));
        assert_eq!(rx.take(), None);
        assert_eq!(
            rx.stats(),
            SlotStats {
                posted: 3,
                superseded: 2
            }
        );
    }

    #[test]
    fn test_superseded_values_are_dropped_once() {
        let drops = Arc::new(AtomicUsize::new(0));

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (tx, rx) = latest_slot();
        for _ in 0..4 {
            tx.post(Counted(Arc::clone(&drops))).unwrap();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 3);

        let last = rx.take();
        assert!(last.is_some());
        drop(last);
        assert_eq!(drops.load(Ordering::SeqCst), 4);

        tx.post(Counted(Arc::clone(&drops))).unwrap();
        drop(rx);
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (tx, rx) = latest_slot::<u8>();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.post(7), Err(SlotClosed));
    }

    #[test]
    fn test_wait_timeout_wakes_on_post() {
        let (tx, rx) = latest_slot();
        let poster = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.post("frame").unwrap();
        });
        assert_eq!(rx.wait_timeout(Duration::from_secs(5)), Some("frame"));
        poster.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let (_tx, rx) = latest_slot::<u8>();
        let started = Instant::now();
        assert_eq!(rx.wait_timeout(Duration::from_millis(15)), None);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_waker_runs_per_post() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (tx, rx) = latest_slot_with_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tx.post(1).unwrap();
        tx.post(2).unwrap();
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert!(rx.drain());
        assert!(!rx.has_pending());
    }
}
