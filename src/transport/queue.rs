//! Bounded per-connection outbound queue.
//!
//! Every connection owns one queue drained by its writer task. Publishers
//! never wait on it: a push either succeeds immediately or reports that the
//! consumer is too slow, and [`SlowConsumerPolicy`] decides what happens next.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, watch};

// ============================================================================
// SlowConsumerPolicy
// ============================================================================

/// What to do when a connection's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlowConsumerPolicy {
    /// Close the connection; the send counts as a transport failure.
    #[default]
    Disconnect,
    /// Discard the oldest queued frame and keep the connection.
    DropOldest,
}

// ============================================================================
// Push Results
// ============================================================================

/// Successful push outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Frame queued without loss.
    Queued,
    /// Frame queued after discarding the oldest one.
    DroppedOldest,
}

/// Failed push outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// Queue was closed.
    Closed,
    /// Queue is full under [`SlowConsumerPolicy::Disconnect`].
    Full,
}

// ============================================================================
// OutboundQueue
// ============================================================================

/// A queued frame, tagged so overflow never discards control frames.
struct Slot<T> {
    frame: T,
    control: bool,
}

/// Queued frames plus the count of data frames among them.
struct Pending<T> {
    slots: VecDeque<Slot<T>>,
    data: usize,
}

impl<T> Pending<T> {
    fn push(&mut self, frame: T, control: bool) {
        if !control {
            self.data += 1;
        }
        self.slots.push_back(Slot { frame, control });
    }

    fn pop_front(&mut self) -> Option<T> {
        let slot = self.slots.pop_front()?;
        if !slot.control {
            self.data -= 1;
        }
        Some(slot.frame)
    }

    /// Drops the oldest data frame, leaving control frames in place.
    fn drop_oldest_data(&mut self) {
        if let Some(index) = self.slots.iter().position(|slot| !slot.control) {
            self.slots.remove(index);
            self.data -= 1;
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.data = 0;
    }
}

/// FIFO of frames waiting for the writer task.
pub struct OutboundQueue<T> {
    /// Pending frames.
    frames: Mutex<Pending<T>>,
    /// Bound applied to data frames.
    capacity: usize,
    /// Overflow policy.
    policy: SlowConsumerPolicy,
    /// Wakes the writer when a frame arrives or the queue closes.
    ready: Notify,
    /// Closed flag, observable by reader and writer tasks.
    closed: watch::Sender<bool>,
}

impl<T> OutboundQueue<T> {
    /// Creates an open queue.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize, policy: SlowConsumerPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(Pending {
                slots: VecDeque::with_capacity(capacity.min(64)),
                data: 0,
            }),
            capacity,
            policy,
            ready: Notify::new(),
            closed: watch::Sender::new(false),
        }
    }

    /// Queues a data frame, applying the capacity bound.
    ///
    /// Only data frames count toward the bound, and `DropOldest` only ever
    /// discards data frames.
    ///
    /// # Errors
    ///
    /// - [`PushError::Closed`] if the queue is closed
    /// - [`PushError::Full`] if full and the policy is `Disconnect`
    pub fn push(&self, frame: T) -> Result<Enqueued, PushError> {
        if self.is_closed() {
            return Err(PushError::Closed);
        }

        let outcome = {
            let mut frames = self.frames.lock();
            let outcome = if frames.data >= self.capacity {
                match self.policy {
                    SlowConsumerPolicy::Disconnect => return Err(PushError::Full),
                    SlowConsumerPolicy::DropOldest => {
                        frames.drop_oldest_data();
                        Enqueued::DroppedOldest
                    }
                }
            } else {
                Enqueued::Queued
            };
            frames.push(frame, false);
            outcome
        };

        self.ready.notify_one();
        Ok(outcome)
    }

    /// Queues a control frame; not subject to the capacity bound.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Closed`] if the queue is closed.
    pub fn push_control(&self, frame: T) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed);
        }

        self.frames.lock().push(frame, true);
        self.ready.notify_one();
        Ok(())
    }

    /// Waits for the next frame.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn next(&self) -> Option<T> {
        loop {
            if self.is_closed() {
                return None;
            }

            let frame = self.frames.lock().pop_front();
            if frame.is_some() {
                return frame;
            }

            self.ready.notified().await;
        }
    }

    /// Closes the queue and discards pending frames.
    ///
    /// Returns `true` if this call closed it.
    pub fn close(&self) -> bool {
        let was_closed = self.closed.send_replace(true);
        self.frames.lock().clear();
        self.ready.notify_one();
        !was_closed
    }

    /// Returns `true` once closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Returns a receiver that observes the closed flag.
    #[must_use]
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Returns the number of pending frames.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().slots.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().slots.is_empty()
    }

    /// Returns the capacity bound.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Resolves once a watch flag turns `true` or its sender is dropped.
pub(crate) async fn signalled(flag: &mut watch::Receiver<bool>) {
    let _ = flag.wait_for(|raised| *raised).await;
}

// ============================================================================
// Tests
// ============================================================================
