/// Errors raised by frame capture and display management.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The array cannot be captured as a frame (wrong element type, rank,
    /// or byte length). Raised before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested monitor does not exist.
    #[error("invalid monitor {index} ({count} available)")]
    MonitorOutOfRange { index: usize, count: usize },

    /// The surface backend failed to create a display surface.
    #[error("surface creation failed: {0}")]
    Surface(String),

    /// No display is registered under this id.
    #[error("unknown display {0}")]
    UnknownDisplay(u64),

    /// The display was already closed.
    #[error("display closed")]
    Closed,

    /// Failed to start the consumer thread.
    #[error("failed to spawn consumer thread: {0}")]
    Spawn(std::io::Error),
}

/// Failure reported by a [`crate::DisplaySink`] while presenting a frame.
///
/// Never fatal to the consumer loop.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The frame does not fit the surface.
    #[error("frame {got_width}x{got_height} does not fit surface {width}x{height}")]
    Geometry {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// Writing the frame out failed.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DisplayError>;
