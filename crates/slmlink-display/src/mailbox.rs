//! Single-slot, latest-wins frame hand-off.
//!
//! ```text
//!            put / put_with_token
//!   EMPTY ──────────────────────────▶ FILLED ──┐
//!     ▲                                  │     │ put (replace; old token
//!     └──────────── take / discard ──────┘ ◀───┘      force-released)
//! ```
//!
//! The slot and its counters live under one mutex shared by `put` and
//! `take`, so the consumer never sees a half-written frame and never gets
//! the same frame twice.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::trace;

use crate::frame::Frame;
use crate::token::{release_pair, ReleaseHandle, ReleaseToken};

/// A frame taken out of the mailbox, with its release token if one was attached.
///
/// Release the token (via [`Delivery::presented`]) after the frame was
/// handed to the display. Dropping an unreleased delivery force-releases it.
#[derive(Debug)]
pub struct Delivery {
    pub frame: Frame,
    pub token: Option<ReleaseToken>,
}

impl Delivery {
    /// Mark the frame as presented, releasing its token.
    pub fn presented(self) -> Frame {
        if let Some(token) = self.token {
            token.release();
        }
        self.frame
    }
}

/// Mailbox counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    /// Frames stored.
    pub puts: u64,
    /// Frames handed to the consumer.
    pub takes: u64,
    /// Frames overwritten or discarded before the consumer took them.
    pub dropped: u64,
}

#[derive(Default)]
struct Slot {
    pending: Option<Delivery>,
    stats: MailboxStats,
}

/// Single-slot coalescing buffer between one producer and one consumer.
#[derive(Default)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any frame not yet taken. Never blocks on the
    /// consumer.
    pub fn put(&self, frame: Frame) {
        self.store(Delivery { frame, token: None });
    }

    /// Store a frame with a release token attached and return the producer's
    /// handle to it.
    pub fn put_with_token(&self, frame: Frame) -> ReleaseHandle {
        let (token, handle) = release_pair();
        self.store(Delivery {
            frame,
            token: Some(token),
        });
        handle
    }

    fn store(&self, delivery: Delivery) {
        let replaced = {
            let mut slot = self.lock();
            slot.stats.puts += 1;
            let replaced = slot.pending.replace(delivery);
            if replaced.is_some() {
                slot.stats.dropped += 1;
            }
            replaced
        };
        self.ready.notify_one();

        if let Some(old) = replaced {
            trace!(shape = %old.frame.shape(), "overwrote unconsumed frame");
            if let Some(token) = old.token {
                token.force_release();
            }
        }
    }

    /// Wait up to `timeout` for a new frame and take it.
    ///
    /// Returns `None` on timeout. A frame is returned at most once.
    pub fn take(&self, timeout: Duration) -> Option<Delivery> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(delivery) = slot.pending.take() {
                slot.stats.takes += 1;
                return Some(delivery);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    /// Take a frame if one is waiting, without blocking.
    pub fn try_take(&self) -> Option<Delivery> {
        self.take(Duration::ZERO)
    }

    /// Empty the slot, force-releasing a pending token. Returns whether a
    /// frame was discarded.
    pub fn discard(&self) -> bool {
        let pending = {
            let mut slot = self.lock();
            let pending = slot.pending.take();
            if pending.is_some() {
                slot.stats.dropped += 1;
            }
            pending
        };
        match pending {
            Some(delivery) => {
                if let Some(token) = delivery.token {
                    token.force_release();
                }
                true
            }
            None => false,
        }
    }

    /// Whether a frame is waiting to be taken.
    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn stats(&self) -> MailboxStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FrameMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock();
        f.debug_struct("FrameMailbox")
            .field("pending", &slot.pending.is_some())
            .field("stats", &slot.stats)
            .finish()
    }
}
