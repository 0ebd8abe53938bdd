//! Release tokens.
//!
//! A producer that reuses its image buffer in place attaches a token to the
//! frame it hands over. The token travels with the frame through the
//! mailbox and is released once the frame reached the display surface, or
//! force-released if the frame was dropped first. The producer side keeps a
//! [`ReleaseHandle`] to observe that.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How a token came to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The frame was handed to the display sink.
    Presented,
    /// The frame was overwritten, discarded, or its token dropped unused.
    Dropped,
}

#[derive(Default)]
struct ReleaseState {
    outcome: Mutex<Option<ReleaseOutcome>>,
    released: Condvar,
}

impl ReleaseState {
    fn set(&self, outcome: ReleaseOutcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
            self.released.notify_all();
        }
    }
}

/// Consumer-side half: owned by whoever currently holds the frame.
///
/// Not clonable, so it can only be released once. Dropping an unreleased
/// token releases it as [`ReleaseOutcome::Dropped`]; a producer waiting on
/// the handle is never left blocked.
pub struct ReleaseToken {
    state: Option<Arc<ReleaseState>>,
}

/// Producer-side half: observes the token.
#[derive(Clone)]
pub struct ReleaseHandle {
    state: Arc<ReleaseState>,
}

/// Create a linked token/handle pair.
pub fn release_pair() -> (ReleaseToken, ReleaseHandle) {
    let state = Arc::new(ReleaseState::default());
    (
        ReleaseToken {
            state: Some(Arc::clone(&state)),
        },
        ReleaseHandle { state },
    )
}

impl ReleaseToken {
    /// Release after the frame was presented.
    pub fn release(mut self) {
        if let Some(state) = self.state.take() {
            state.set(ReleaseOutcome::Presented);
        }
    }

    /// Release without presenting (frame overwritten or discarded).
    pub fn force_release(mut self) {
        if let Some(state) = self.state.take() {
            state.set(ReleaseOutcome::Dropped);
        }
    }
}

impl Drop for ReleaseToken {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.set(ReleaseOutcome::Dropped);
        }
    }
}

impl std::fmt::Debug for ReleaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseToken").finish_non_exhaustive()
    }
}

impl ReleaseHandle {
    /// Whether the token has been released, without waiting.
    pub fn is_released(&self) -> bool {
        self.outcome().is_some()
    }

    /// The release outcome, if released.
    pub fn outcome(&self) -> Option<ReleaseOutcome> {
        *self
            .state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the token is released or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<ReleaseOutcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .state
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while slot.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .state
                .released
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
        *slot
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("outcome", &self.outcome())
            .finish()
    }
}
