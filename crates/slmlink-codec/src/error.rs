use crate::choice::CompressionChoice;

/// Errors that can occur while compressing or decompressing payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload could not be decompressed with the session's codec.
    ///
    /// Fatal to that message only; the connection stays usable.
    #[error("corrupt {choice} payload: {source}")]
    CorruptPayload {
        choice: CompressionChoice,
        source: std::io::Error,
    },

    /// Decompressed output would exceed the allowed size.
    #[error("{choice} payload inflates past {limit} bytes")]
    OutputTooLarge {
        choice: CompressionChoice,
        limit: usize,
    },

    /// The compression level is outside the range the algorithm accepts.
    #[error("invalid {choice} compression level {level} (expected {min}..={max})")]
    InvalidLevel {
        choice: CompressionChoice,
        level: u32,
        min: u32,
        max: u32,
    },

    /// The compression name is not one of the supported algorithms.
    #[error("unknown compression '{0}' (expected none, zlib, gzip or bz2)")]
    UnknownChoice(String),

    /// Compressing failed while writing into the in-memory encoder.
    #[error("compression failed: {0}")]
    Compress(std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
