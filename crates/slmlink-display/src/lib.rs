//! Latest-wins frame hand-off between an image producer and a display.
//!
//! A producer [`FrameMailbox::put`]s frames without ever blocking; a
//! [`ConsumerLoop`] drains the single slot and presents whatever is newest
//! to a [`DisplaySink`]. Frames that are overwritten before the consumer
//! gets to them are dropped on purpose.
//!
//! # Module Structure
//!
//! - [`frame`]: the captured image type and typed array views
//! - [`token`]: release tokens for producers that reuse buffers
//! - [`mailbox`]: the single-slot coalescing buffer
//! - [`sink`]: the display surface interface and headless sinks
//! - [`consumer`]: the polling thread feeding a sink
//! - [`registry`]: explicit ownership of open display surfaces

pub mod consumer;
pub mod error;
pub mod frame;
pub mod mailbox;
pub mod registry;
pub mod sink;
pub mod surface;
pub mod token;

pub use consumer::{ConsumerLoop, DEFAULT_POLL_INTERVAL};
pub use error::{DisplayError, Result, SinkError};
pub use frame::{ArrayRef, ElementType, Frame, FrameShape};
pub use mailbox::{Delivery, FrameMailbox, MailboxStats};
pub use registry::{Display, DisplayId, DisplayRegistry, DEFAULT_LOCK_TIMEOUT};
pub use sink::{DisplaySink, MemorySink, MemorySinkHandle, RawFileSink};
pub use surface::{HeadlessBackend, MonitorGeometry, SurfaceBackend, SurfaceOptions};
pub use token::{release_pair, ReleaseHandle, ReleaseOutcome, ReleaseToken};
