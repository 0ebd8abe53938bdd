//! Get the newest image onto a spatial light modulator, locally or across
//! the network.
//!
//! slmlink hands frames from a producer to a display through a single-slot
//! mailbox where the latest frame always wins, and streams frames to a
//! remote display as compressed, length-prefixed messages with optional
//! confirm/retry.
//!
//! # Crate Structure
//!
//! - [`transport`]: low-latency TCP streams
//! - [`wire`]: length-prefixed message framing
//! - [`codec`]: payload compression (zlib, gzip, bz2)
//! - [`display`]: frames, the mailbox, display sinks and the registry
//! - [`peer`]: stream client and server (behind the `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use slmlink_transport::*;
}

/// Re-export framing types.
pub mod wire {
    pub use slmlink_wire::*;
}

/// Re-export compression types.
pub mod codec {
    pub use slmlink_codec::*;
}

/// Re-export display types.
pub mod display {
    pub use slmlink_display::*;
}

/// Re-export client/server types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use slmlink_peer::*;
}

pub use slmlink_display::{Frame, FrameMailbox, FrameShape};
#[cfg(feature = "peer")]
pub use slmlink_peer::{ClientConfig, StreamClient, StreamServer};
