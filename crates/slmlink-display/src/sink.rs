//! Display surface interface.
//!
//! The windowing side (fullscreen placement, cursor hiding, painting) lives
//! behind [`DisplaySink`]. The sinks here are headless: one keeps frames in
//! memory, one mirrors the latest frame to a file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SinkError;
use crate::frame::{Frame, FrameShape};

/// A display surface that shows frames.
///
/// `present` guarantees the frame is the next thing rendered and must not
/// block past the surface's own repaint cycle.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        (**self).present(frame)
    }
}

#[derive(Default)]
struct MemoryState {
    latest: Option<Frame>,
    presented: u64,
}

/// Keeps the most recently presented frame in memory.
///
/// Optionally bound to a surface resolution, in which case frames of any
/// other size are refused like a real fixed-size surface would.
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    resolution: Option<(u32, u32)>,
}

/// Read side of a [`MemorySink`], usable from other threads.
#[derive(Clone)]
pub struct MemorySinkHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> (Self, MemorySinkHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            Self {
                state: Arc::clone(&state),
                resolution: None,
            },
            MemorySinkHandle { state },
        )
    }

    /// Refuse frames whose width/height differ from the given resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }
}

impl DisplaySink for MemorySink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if let Some((width, height)) = self.resolution {
            if frame.width() != width || frame.height() != height {
                return Err(SinkError::Geometry {
                    width,
                    height,
                    got_width: frame.width(),
                    got_height: frame.height(),
                });
            }
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest = Some(frame.clone());
        state.presented += 1;
        Ok(())
    }
}

impl MemorySinkHandle {
    /// The last presented frame.
    pub fn latest(&self) -> Option<Frame> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// How many frames were presented.
    pub fn presented(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .presented
    }
}

/// Rewrites a file with the raw bytes of every presented frame.
///
/// The file is replaced atomically (write to a sibling temp file, then
/// rename), so readers never observe a partial image.
pub struct RawFileSink {
    path: PathBuf,
    tmp_path: PathBuf,
    last_shape: Option<FrameShape>,
}

impl RawFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".partial");
        let tmp_path = path.with_file_name(tmp_name);
        Self {
            path,
            tmp_path,
            last_shape: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shape of the last frame written.
    pub fn last_shape(&self) -> Option<FrameShape> {
        self.last_shape
    }
}

impl DisplaySink for RawFileSink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        {
            let mut file = fs::File::create(&self.tmp_path)?;
            file.write_all(frame.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&self.tmp_path, &self.path)?;
        self.last_shape = Some(frame.shape());
        Ok(())
    }
}
