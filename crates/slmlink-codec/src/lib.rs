//! Payload compression for image messages.
//!
//! Both ends agree on a [`CompressionChoice`] out of band; it is never
//! negotiated on the wire. [`Codec`] resolves the level once and is then
//! applied to every message of a session.

pub mod choice;
pub mod codec;
pub mod error;

pub use choice::{CompressionChoice, DEFAULT_DEFLATE_LEVEL, MAX_LEVEL};
pub use codec::Codec;
pub use error::{CodecError, Result};
