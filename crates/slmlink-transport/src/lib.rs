//! Low-latency TCP transport for streaming images to a display peer.
//!
//! This is the lowest layer of slmlink. Every connection produced here has
//! send coalescing (Nagle) disabled so small acknowledgements and image
//! messages leave the host immediately. Everything else builds on top of
//! the [`SlmStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::SlmStream;
pub use tcp::{TcpTransport, DEFAULT_PORT};
