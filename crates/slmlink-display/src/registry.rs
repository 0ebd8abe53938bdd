//! Open display surfaces and the registry that owns them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::consumer::{ConsumerLoop, DEFAULT_POLL_INTERVAL};
use crate::error::{DisplayError, Result};
use crate::frame::{ArrayRef, Frame};
use crate::mailbox::{FrameMailbox, MailboxStats};
use crate::surface::{MonitorGeometry, SurfaceBackend, SurfaceOptions};

/// How long an image-locked update waits for the frame to reach the surface.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Registry-assigned display identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayId(u64);

impl DisplayId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display-{}", self.0)
    }
}

/// One fullscreen surface with its mailbox and consumer thread.
pub struct Display {
    id: DisplayId,
    geometry: MonitorGeometry,
    options: SurfaceOptions,
    lock_timeout: Duration,
    mailbox: Arc<FrameMailbox>,
    consumer: Mutex<Option<ConsumerLoop>>,
    closed: AtomicBool,
}

impl Display {
    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn options(&self) -> SurfaceOptions {
        self.options
    }

    pub fn geometry(&self) -> MonitorGeometry {
        self.geometry
    }

    /// Monitor resolution as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.geometry.width, self.geometry.height)
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MailboxStats {
        self.mailbox.stats()
    }

    /// Show `frame`, replacing whatever is pending.
    ///
    /// With image lock enabled, returns once the frame was handed to the
    /// surface, or was superseded, or `lock_timeout` elapsed.
    pub fn update_frame(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(DisplayError::Closed);
        }
        if !self.options.image_lock {
            self.mailbox.put(frame);
            return Ok(());
        }
        let handle = self.mailbox.put_with_token(frame);
        if handle.wait(self.lock_timeout).is_none() {
            debug!(
                display = %self.id,
                timeout = ?self.lock_timeout,
                "image lock timed out before presentation"
            );
        }
        Ok(())
    }

    /// Capture caller memory and show it. Non-`u8` arrays are rejected
    /// before anything reaches the mailbox.
    pub fn update_array(&self, array: ArrayRef<'_>) -> Result<()> {
        let frame = Frame::from_array(array)?;
        self.update_frame(frame)
    }

    /// Stop the consumer thread. Further updates fail with
    /// [`DisplayError::Closed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let consumer = self.lock_consumer().take();
        if let Some(mut consumer) = consumer {
            let presented = consumer.stop();
            info!(display = %self.id, presented, "display closed");
        }
    }

    fn lock_consumer(&self) -> MutexGuard<'_, Option<ConsumerLoop>> {
        self.consumer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.id)
            .field("geometry", &self.geometry)
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owner of every open [`Display`].
///
/// Dropping the registry closes all displays.
pub struct DisplayRegistry {
    backend: Box<dyn SurfaceBackend>,
    displays: Mutex<BTreeMap<DisplayId, Arc<Display>>>,
    next_id: AtomicU64,
    lock_timeout: Duration,
    poll_interval: Duration,
}

impl DisplayRegistry {
    pub fn new(backend: impl SurfaceBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            displays: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Image-lock wait bound for displays opened afterwards.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Consumer poll interval for displays opened afterwards.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn backend(&self) -> &dyn SurfaceBackend {
        self.backend.as_ref()
    }

    /// Create a surface on the requested monitor and start its consumer.
    pub fn open(&self, options: SurfaceOptions) -> Result<DisplayId> {
        let monitors = self.backend.monitors();
        let geometry = *monitors
            .get(options.monitor)
            .ok_or(DisplayError::MonitorOutOfRange {
                index: options.monitor,
                count: monitors.len(),
            })?;

        let sink = self.backend.create_surface(geometry, &options)?;
        let id = DisplayId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mailbox = Arc::new(FrameMailbox::new());
        let consumer = ConsumerLoop::spawn_named(
            &format!("slmlink-{id}"),
            Arc::clone(&mailbox),
            sink,
            self.poll_interval,
        )?;

        let display = Arc::new(Display {
            id,
            geometry,
            options,
            lock_timeout: self.lock_timeout,
            mailbox,
            consumer: Mutex::new(Some(consumer)),
            closed: AtomicBool::new(false),
        });
        self.lock().insert(id, display);
        info!(
            display = %id,
            monitor = options.monitor,
            width = geometry.width,
            height = geometry.height,
            image_lock = options.image_lock,
            "display opened"
        );
        Ok(id)
    }

    pub fn get(&self, id: DisplayId) -> Result<Arc<Display>> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or(DisplayError::UnknownDisplay(id.0))
    }

    /// Close and forget one display.
    pub fn close(&self, id: DisplayId) -> Result<()> {
        let display = self
            .lock()
            .remove(&id)
            .ok_or(DisplayError::UnknownDisplay(id.0))?;
        display.close();
        Ok(())
    }

    pub fn close_all(&self) {
        let displays = std::mem::take(&mut *self.lock());
        for display in displays.into_values() {
            display.close();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<DisplayId> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<DisplayId, Arc<Display>>> {
        self.displays.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DisplayRegistry {
    fn drop(&mut self) {
        let open = self.len();
        if open > 0 {
            warn!(open, "registry dropped with open displays, closing them");
        }
        self.close_all();
    }
}

impl fmt::Debug for DisplayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayRegistry")
            .field("displays", &self.ids())
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::error::SinkError;
    use crate::frame::{ElementType, FrameShape};
    use crate::sink::DisplaySink;
    use crate::surface::HeadlessBackend;

    fn two_monitors() -> HeadlessBackend {
        HeadlessBackend::new(vec![
            MonitorGeometry::new(0, 0, 1920, 1080),
            MonitorGeometry::new(1920, 0, 4, 2),
        ])
    }

    fn frame(value: u8) -> Frame {
        Frame::filled(FrameShape::mono(4, 2).unwrap(), value)
    }

    #[test]
    fn open_defaults_to_second_monitor() {
        let registry = DisplayRegistry::new(two_monitors());
        let id = registry.open(SurfaceOptions::default()).unwrap();

        let display = registry.get(id).unwrap();
        assert_eq!(display.size(), (4, 2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_monitor_out_of_range() {
        let registry = DisplayRegistry::new(HeadlessBackend::single(800, 600));
        let err = registry.open(SurfaceOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DisplayError::MonitorOutOfRange { index: 1, count: 1 }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn image_lock_update_returns_after_presentation() {
        let backend = Arc::new(two_monitors());
        let registry = DisplayRegistry::new(Arc::clone(&backend))
            .with_poll_interval(Duration::from_millis(10));
        let id = registry
            .open(SurfaceOptions::on_monitor(1).with_image_lock(true))
            .unwrap();
        let display = registry.get(id).unwrap();

        display.update_frame(frame(3)).unwrap();

        assert_eq!(display.stats().takes, 1);
        let surfaces = backend.surfaces();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].latest().unwrap(), frame(3));
    }

    #[test]
    fn update_array_rejects_wrong_element_type() {
        let registry = DisplayRegistry::new(two_monitors());
        let id = registry.open(SurfaceOptions::on_monitor(1)).unwrap();
        let display = registry.get(id).unwrap();

        let data = [0u8; 16];
        let err = display
            .update_array(ArrayRef::new(ElementType::F32, &[2, 2], &data))
            .unwrap_err();
        assert!(matches!(err, DisplayError::InvalidInput(_)));
        assert_eq!(display.stats().puts, 0);
    }

    #[test]
    fn closed_display_refuses_updates() {
        let registry = DisplayRegistry::new(two_monitors());
        let id = registry.open(SurfaceOptions::on_monitor(1)).unwrap();
        let display = registry.get(id).unwrap();

        registry.close(id).unwrap();
        assert!(display.is_closed());
        assert!(matches!(
            display.update_frame(frame(1)),
            Err(DisplayError::Closed)
        ));
        assert!(matches!(
            registry.close(id),
            Err(DisplayError::UnknownDisplay(_))
        ));
    }

    struct StuckSink;

    impl DisplaySink for StuckSink {
        fn present(&mut self, _frame: &Frame) -> std::result::Result<(), SinkError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
    }

    #[test]
    fn image_lock_wait_is_bounded() {
        let backend = HeadlessBackend::single(4, 2)
            .with_factory(|_, _| Ok(Box::new(StuckSink) as Box<dyn DisplaySink>));
        let registry = DisplayRegistry::new(backend)
            .with_lock_timeout(Duration::from_millis(50))
            .with_poll_interval(Duration::from_millis(10));
        let id = registry
            .open(SurfaceOptions::on_monitor(0).with_image_lock(true))
            .unwrap();
        let display = registry.get(id).unwrap();

        display.update_frame(frame(1)).unwrap();
        let start = Instant::now();
        display.update_frame(frame(2)).unwrap();
        assert!(start.elapsed() < Duration::from_millis(300));
    }

    #[test]
    fn drop_closes_every_display() {
        let registry = DisplayRegistry::new(two_monitors());
        let first = registry.open(SurfaceOptions::on_monitor(0)).unwrap();
        let second = registry.open(SurfaceOptions::on_monitor(1)).unwrap();
        assert_ne!(first, second);

        let display = registry.get(first).unwrap();
        drop(registry);
        assert!(display.is_closed());
    }
}
