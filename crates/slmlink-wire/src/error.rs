/// Errors that can occur during message encoding/decoding.
///
/// Every variant except `Io` with a timeout kind is fatal to the connection:
/// the stream cannot be resynchronised after a bad prefix.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The length prefix is negative.
    #[error("negative message length prefix ({0})")]
    NegativeLength(i32),

    /// The length prefix is zero and empty messages are not allowed.
    #[error("empty message (zero length prefix)")]
    EmptyMessage,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

impl MessageError {
    /// Whether this is a read/write timeout rather than a protocol failure.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;
