//! The thread that drains a mailbox into a display sink.
//!
//! It wakes at least once per poll interval to check its stop flag, so
//! `stop` returns promptly even when no frames arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{DisplayError, Result};
use crate::mailbox::FrameMailbox;
use crate::sink::DisplaySink;

/// How often the consumer wakes up to check for shutdown when idle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Thread that drains a [`FrameMailbox`] into a [`DisplaySink`].
///
/// Each iteration takes the newest frame (waiting at most one poll
/// interval), presents it, then releases its token. Presentation failures
/// are logged and never stop the loop.
pub struct ConsumerLoop {
    mailbox: Arc<FrameMailbox>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl ConsumerLoop {
    pub fn spawn(
        mailbox: Arc<FrameMailbox>,
        sink: Box<dyn DisplaySink>,
        poll_interval: Duration,
    ) -> Result<Self> {
        Self::spawn_named("slmlink-consumer", mailbox, sink, poll_interval)
    }

    /// Like [`ConsumerLoop::spawn`], with an explicit thread name.
    pub fn spawn_named(
        name: &str,
        mailbox: Arc<FrameMailbox>,
        mut sink: Box<dyn DisplaySink>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let mailbox = Arc::clone(&mailbox);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run(&mailbox, sink.as_mut(), &stop, poll_interval))
                .map_err(DisplayError::Spawn)?
        };
        debug!(thread = name, ?poll_interval, "consumer loop started");
        Ok(Self {
            mailbox,
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop, join its thread and discard anything still pending.
    ///
    /// Returns how many frames were presented. Idempotent.
    pub fn stop(&mut self) -> u64 {
        self.stop.store(true, Ordering::SeqCst);
        let presented = match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("consumer thread panicked");
                0
            }),
            None => 0,
        };
        if self.mailbox.discard() {
            debug!("discarded pending frame on consumer shutdown");
        }
        presented
    }
}

impl Drop for ConsumerLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConsumerLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerLoop")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn run(
    mailbox: &FrameMailbox,
    sink: &mut dyn DisplaySink,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> u64 {
    let mut presented = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let Some(delivery) = mailbox.take(poll_interval) else {
            continue;
        };
        match sink.present(&delivery.frame) {
            Ok(()) => {
                presented += 1;
                trace!(shape = %delivery.frame.shape(), "frame presented");
            }
            Err(err) => warn!(error = %err, "display sink failed to present frame"),
        }
        delivery.presented();
    }
    presented
}
