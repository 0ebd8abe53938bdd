use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use slmlink_transport::SlmStream;
use tracing::trace;

use crate::codec::{encode_message, MessageConfig};
use crate::error::{MessageError, Result};
use crate::reader::transport_to_message_error;

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Writes complete messages to any `Write` stream.
///
/// The prefix and payload are encoded into one buffer and written as a
/// single logical write; partial writes are continued until the whole
/// message is out or the stream fails.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: MessageConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, MessageConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: MessageConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one payload (blocking).
    ///
    /// A write timeout surfaces as `MessageError::Io`; the message may then
    /// be partially on the wire and the connection must be dropped.
    ///
    /// Returns the number of bytes put on the wire, prefix included.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        encode_message(payload, &self.config, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(MessageError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MessageError::Io(err)),
            }
        }

        self.flush()?;
        trace!(len = payload.len(), "message sent");
        Ok(offset)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MessageError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent message encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current message writer configuration.
    pub fn config(&self) -> &MessageConfig {
        &self.config
    }
}

impl MessageWriter<SlmStream> {
    /// Create a message writer for `SlmStream` and apply write timeout from config.
    pub fn with_config_stream(inner: SlmStream, config: MessageConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_message_error)?;
        Ok(Self::with_config(inner, config))
    }
}
