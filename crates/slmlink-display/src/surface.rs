//! Monitor enumeration and surface creation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sink::{DisplaySink, MemorySink, MemorySinkHandle};

/// Placement and behaviour of a display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceOptions {
    /// Zero-based monitor index. Defaults to the second monitor, which is
    /// where a modulator is normally attached.
    pub monitor: usize,
    /// Keep the surface above other windows.
    pub always_on_top: bool,
    /// Make updates return only once the frame reached the surface.
    pub image_lock: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            monitor: 1,
            always_on_top: false,
            image_lock: false,
        }
    }
}

impl SurfaceOptions {
    pub fn on_monitor(monitor: usize) -> Self {
        Self {
            monitor,
            ..Self::default()
        }
    }

    pub fn with_always_on_top(mut self, always_on_top: bool) -> Self {
        self.always_on_top = always_on_top;
        self
    }

    pub fn with_image_lock(mut self, image_lock: bool) -> Self {
        self.image_lock = image_lock;
        self
    }
}

/// Position and resolution of one monitor, in desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorGeometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// The windowing system: lists monitors and creates fullscreen surfaces.
pub trait SurfaceBackend: Send + Sync {
    fn monitors(&self) -> Vec<MonitorGeometry>;

    fn create_surface(
        &self,
        geometry: MonitorGeometry,
        options: &SurfaceOptions,
    ) -> Result<Box<dyn DisplaySink>>;
}

impl<B: SurfaceBackend + ?Sized> SurfaceBackend for std::sync::Arc<B> {
    fn monitors(&self) -> Vec<MonitorGeometry> {
        (**self).monitors()
    }

    fn create_surface(
        &self,
        geometry: MonitorGeometry,
        options: &SurfaceOptions,
    ) -> Result<Box<dyn DisplaySink>> {
        (**self).create_surface(geometry, options)
    }
}

type SinkFactory =
    dyn Fn(MonitorGeometry, &SurfaceOptions) -> Result<Box<dyn DisplaySink>> + Send + Sync;

/// A backend without a windowing system.
///
/// Surfaces are [`MemorySink`]s sized to their monitor unless a factory
/// is supplied.
pub struct HeadlessBackend {
    monitors: Vec<MonitorGeometry>,
    factory: Option<Box<SinkFactory>>,
    surfaces: std::sync::Mutex<Vec<MemorySinkHandle>>,
}

impl HeadlessBackend {
    pub fn new(monitors: Vec<MonitorGeometry>) -> Self {
        Self {
            monitors,
            factory: None,
            surfaces: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// One monitor of the given resolution at the origin.
    pub fn single(width: u32, height: u32) -> Self {
        Self::new(vec![MonitorGeometry::new(0, 0, width, height)])
    }

    /// Build surfaces with `factory` instead of in-memory sinks.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(MonitorGeometry, &SurfaceOptions) -> Result<Box<dyn DisplaySink>>
            + Send
            + Sync
            + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Read handles to the in-memory surfaces created so far, in creation
    /// order. Empty when a factory is in use.
    pub fn surfaces(&self) -> Vec<MemorySinkHandle> {
        self.surfaces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn monitors(&self) -> Vec<MonitorGeometry> {
        self.monitors.clone()
    }

    fn create_surface(
        &self,
        geometry: MonitorGeometry,
        options: &SurfaceOptions,
    ) -> Result<Box<dyn DisplaySink>> {
        if let Some(factory) = &self.factory {
            return factory(geometry, options);
        }
        let (sink, handle) = MemorySink::new();
        self.surfaces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);
        Ok(Box::new(sink.with_resolution(geometry.width, geometry.height)))
    }
}

impl std::fmt::Debug for HeadlessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessBackend")
            .field("monitors", &self.monitors)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}
