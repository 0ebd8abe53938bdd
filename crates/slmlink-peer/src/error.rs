use std::time::Duration;

use slmlink_display::DisplayError;

/// Why a single delivery attempt did not get confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// No acknowledgement arrived in time.
    #[error("no acknowledgement within {0:?}")]
    Timeout(Duration),

    /// The peer answered `err`.
    #[error("peer rejected the frame")]
    NegativeAck,
}

/// Errors that can occur while sending or receiving frames.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error (connect, resolve, socket I/O).
    #[error("transport error: {0}")]
    Transport(#[from] slmlink_transport::TransportError),

    /// Framing error. The connection cannot be trusted afterwards.
    #[error("message error: {0}")]
    Wire(#[from] slmlink_wire::MessageError),

    /// Compression or decompression failed.
    #[error("codec error: {0}")]
    Codec(#[from] slmlink_codec::CodecError),

    /// The array cannot be sent (wrong element type or shape). Nothing was
    /// written to the socket.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Display-side failure other than invalid input.
    #[error("display error: {0}")]
    Display(DisplayError),

    /// Every attempt failed.
    #[error("delivery failed after {attempts} attempt(s): {last}")]
    DeliveryFailed { attempts: u32, last: AttemptFailure },

    /// A received frame does not have the expected size.
    #[error("frame size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: usize, got: usize },
}

impl From<DisplayError> for PeerError {
    fn from(err: DisplayError) -> Self {
        match err {
            DisplayError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Display(other),
        }
    }
}

impl PeerError {
    /// Whether the session survives this error. Rejected frames are
    /// answered and the peer may send again; anything else ends the
    /// connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. } | Self::Codec(_) | Self::InvalidInput(_)
        )
    }

    /// Whether the last attempt ran out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeliveryFailed {
                last: AttemptFailure::Timeout(_),
                ..
            } => true,
            Self::Wire(err) => err.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
