use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use slmlink_transport::SlmStream;
use tracing::trace;

use crate::codec::{decode_message, MessageConfig};
use crate::error::{MessageError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete payloads.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: MessageConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete message payload (blocking).
    ///
    /// Returns `Err(MessageError::ConnectionClosed)` when EOF is reached.
    /// A read timeout surfaces as `MessageError::Io` and leaves any partially
    /// received message buffered, so the call can be repeated.
    pub fn read_message(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = decode_message(&mut self.buf, &self.config)? {
                trace!(len = payload.len(), buffered = self.buf.len(), "message received");
                return Ok(payload);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MessageError::Io(err)),
            };

            if read == 0 {
                return Err(MessageError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent message decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current message reader configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}

impl MessageReader<SlmStream> {
    /// Create a message reader for `SlmStream` and apply read timeout from config.
    pub fn with_config_stream(inner: SlmStream, config: MessageConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_message_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_message_error(err: slmlink_transport::TransportError) -> MessageError {
    match err {
        slmlink_transport::TransportError::Io(io)
        | slmlink_transport::TransportError::Accept(io) => MessageError::Io(io),
        slmlink_transport::TransportError::Bind { source, .. }
        | slmlink_transport::TransportError::Connect { source, .. } => MessageError::Io(source),
        other => MessageError::Io(std::io::Error::other(other.to_string())),
    }
}
