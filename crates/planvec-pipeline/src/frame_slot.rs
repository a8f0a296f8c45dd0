//! Single-slot, latest-frame-wins hand-off between a capture thread and
//! a processing thread.
//!
//! The producer never blocks and never builds a backlog: a frame that
//! has not been taken when the next one arrives is overwritten and
//! counted as dropped. A frame that has been taken always runs to
//! completion; there is no cancellation.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct Slot<T> {
    frame: Option<T>,
    closed: bool,
    dropped: u64,
}

/// A capacity-one buffer shared by reference (typically in an `Arc`).
#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    /// An empty, open slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                closed: false,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    // Slot state stays consistent across a panicking holder, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `frame`, replacing any frame not yet taken.
    ///
    /// Returns the displaced frame. Frames put after [`close`](Self::close)
    /// are handed straight back.
    pub fn put(&self, frame: T) -> Option<T> {
        let mut slot = self.lock();
        if slot.closed {
            return Some(frame);
        }
        let displaced = slot.frame.replace(frame);
        if displaced.is_some() {
            slot.dropped += 1;
        }
        drop(slot);
        self.ready.notify_one();
        displaced
    }

    /// Take the current frame without waiting.
    pub fn take(&self) -> Option<T> {
        self.lock().frame.take()
    }

    /// Wait up to `timeout` for a frame.
    ///
    /// Returns `None` on timeout, or once the slot is closed and empty.
    /// A frame put before closing is still delivered.
    pub fn wait_take(&self, timeout: Duration) -> Option<T> {
        let slot = self.lock();
        let (mut slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |s| s.frame.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        slot.frame.take()
    }

    /// Close the slot and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Frames overwritten before anyone took them.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}
