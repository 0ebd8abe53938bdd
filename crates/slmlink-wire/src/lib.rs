//! Length-prefixed message framing for image streams.
//!
//! Every message on the wire is a 4-byte signed little-endian payload length
//! followed by exactly that many payload bytes. The payload is opaque here;
//! higher layers put (possibly compressed) raw image bytes in it. Array
//! shape and element type are never transmitted.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_message, encode_message, MessageConfig, DEFAULT_MAX_PAYLOAD, PREFIX_SIZE};
pub use error::{MessageError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
