//! Sending side: compress, frame, write, and optionally wait for `done`.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slmlink_codec::{Codec, CompressionChoice};
use slmlink_display::{ArrayRef, Frame};
use slmlink_transport::{SlmStream, TcpTransport, DEFAULT_PORT};
use slmlink_wire::{MessageConfig, MessageWriter, DEFAULT_MAX_PAYLOAD};
use tracing::{debug, info, warn};

use crate::ack::{discard_stale, wait_for_ack, Ack};
use crate::error::{AttemptFailure, PeerError, Result};

/// Default acknowledgement wait per attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of attempts per frame.
pub const DEFAULT_RETRIES: u32 = 2;

/// Client session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub compression: CompressionChoice,
    /// Compression level; `None` uses the algorithm default.
    pub level: Option<u32>,
    /// Wait for `done`/`err` after each frame.
    pub wait_for_reply: bool,
    /// Per-attempt acknowledgement wait, also used as the socket write
    /// timeout.
    pub timeout: Duration,
    /// Total attempts per frame.
    pub retries: u32,
    pub connect_timeout: Option<Duration>,
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            compression: CompressionChoice::default(),
            level: None,
            wait_for_reply: true,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            connect_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compression: CompressionChoice, level: Option<u32>) -> Self {
        self.compression = compression;
        self.level = level;
        self
    }

    pub fn with_wait_for_reply(mut self, wait_for_reply: bool) -> Self {
        self.wait_for_reply = wait_for_reply;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReport {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Whether the peer answered `done`. False when not waiting for replies.
    pub confirmed: bool,
    /// Bytes of the compressed payload (without the length prefix).
    pub payload_bytes: usize,
    /// Bytes of the raw frame.
    pub raw_bytes: usize,
}

/// One connection to a remote display, sending frames with optional
/// confirm/retry.
///
/// A frame is compressed, framed and written; when waiting for replies the
/// client reads raw acknowledgement text until `done`, `err`, or the
/// timeout. A failed attempt resends the whole frame from scratch. Errors
/// from the transport, framing or codec end the send immediately.
pub struct StreamClient {
    config: ClientConfig,
    codec: Codec,
    writer: MessageWriter<SlmStream>,
    ack_stream: SlmStream,
    peer: SocketAddr,
    frames_sent: u64,
}

impl StreamClient {
    /// Connect with default settings.
    pub fn connect_to(host: &str, port: u16) -> Result<Self> {
        Self::connect(ClientConfig::new(host, port))
    }

    pub fn connect(config: ClientConfig) -> Result<Self> {
        let codec = Codec::new(config.compression, config.level)?;
        check_timeout("timeout", config.timeout)?;
        if let Some(connect_timeout) = config.connect_timeout {
            check_timeout("connect timeout", connect_timeout)?;
        }
        let stream = TcpTransport::connect(&config.host, config.port, config.connect_timeout)?;
        let peer = stream.peer_addr()?;
        let ack_stream = stream.try_clone()?;

        let message_config = MessageConfig {
            max_payload_size: config.max_payload_size,
            write_timeout: Some(config.timeout),
            ..MessageConfig::default()
        };
        let writer = MessageWriter::with_config_stream(stream, message_config)?;

        info!(
            %peer,
            codec = %codec.choice(),
            level = codec.level(),
            wait_for_reply = config.wait_for_reply,
            "connected to display server"
        );
        Ok(Self {
            config,
            codec,
            writer,
            ack_stream,
            peer,
            frames_sent: 0,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Frames confirmed or written so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Send with the configured timeout and retries.
    pub fn send(&mut self, frame: &Frame) -> Result<SendReport> {
        self.send_frame(frame, self.config.timeout, self.config.retries)
    }

    /// Validate and send caller memory. A non-`u8` array fails with
    /// [`PeerError::InvalidInput`] before anything is written.
    pub fn send_array(
        &mut self,
        array: ArrayRef<'_>,
        timeout: Duration,
        retries: u32,
    ) -> Result<SendReport> {
        let frame = Frame::from_array(array)?;
        self.send_frame(&frame, timeout, retries)
    }

    /// Send one frame, making up to `retries` attempts (at least one).
    ///
    /// `timeout` bounds both the write of each attempt and the wait for its
    /// acknowledgement. Replies still buffered from earlier timed-out
    /// attempts are discarded before each write.
    pub fn send_frame(
        &mut self,
        frame: &Frame,
        timeout: Duration,
        retries: u32,
    ) -> Result<SendReport> {
        check_timeout("timeout", timeout)?;
        self.writer.get_ref().set_write_timeout(Some(timeout))?;
        let max_attempts = retries.max(1);
        let raw = frame.as_bytes();
        let mut last = AttemptFailure::Timeout(timeout);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                info!(attempt, max_attempts, "retrying frame");
            }

            let payload = self.codec.compress(raw)?;
            if self.config.wait_for_reply {
                discard_stale(&mut self.ack_stream)?;
            }
            self.writer.send(&payload)?;
            let report = SendReport {
                attempts: attempt,
                confirmed: false,
                payload_bytes: payload.len(),
                raw_bytes: raw.len(),
            };

            if !self.config.wait_for_reply {
                self.frames_sent += 1;
                debug!(shape = %frame.shape(), bytes = payload.len(), "frame written");
                return Ok(report);
            }

            match wait_for_ack(&mut self.ack_stream, timeout)? {
                Some(Ack::Done) => {
                    self.frames_sent += 1;
                    debug!(shape = %frame.shape(), attempt, "frame confirmed");
                    return Ok(SendReport {
                        confirmed: true,
                        ..report
                    });
                }
                Some(Ack::Err) => {
                    warn!(attempt, shape = %frame.shape(), "peer rejected frame (size mismatch?)");
                    last = AttemptFailure::NegativeAck;
                }
                None => {
                    warn!(attempt, ?timeout, "no acknowledgement before timeout");
                    last = AttemptFailure::Timeout(timeout);
                }
            }
        }

        Err(PeerError::DeliveryFailed {
            attempts: max_attempts,
            last,
        })
    }

    /// Shut down both directions and release the socket.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        debug!(peer = %self.peer, frames = self.frames_sent, "client closed");
        Ok(())
    }
}

fn check_timeout(what: &str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(PeerError::InvalidInput(format!("{what} must be non-zero")));
    }
    Ok(())
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("peer", &self.peer)
            .field("codec", &self.codec)
            .field("wait_for_reply", &self.config.wait_for_reply)
            .field("frames_sent", &self.frames_sent)
            .finish()
    }
}
