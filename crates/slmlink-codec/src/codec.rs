use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use tracing::trace;

use crate::choice::CompressionChoice;
use crate::error::{CodecError, Result};

/// A compression strategy with its level resolved.
///
/// Built once per session and applied to every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    choice: CompressionChoice,
    level: u32,
}

impl Codec {
    /// Build a codec, using the algorithm's default level when `level` is `None`.
    pub fn new(choice: CompressionChoice, level: Option<u32>) -> Result<Self> {
        let level = choice.resolve_level(level)?;
        Ok(Self { choice, level })
    }

    /// The identity codec.
    pub fn none() -> Self {
        Self {
            choice: CompressionChoice::None,
            level: 0,
        }
    }

    pub fn choice(&self) -> CompressionChoice {
        self.choice
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Compress a raw payload.
    pub fn compress(&self, raw: &[u8]) -> Result<Bytes> {
        let out = match self.choice {
            CompressionChoice::None => return Ok(Bytes::copy_from_slice(raw)),
            CompressionChoice::Zlib => {
                let mut encoder =
                    ZlibEncoder::new(Vec::new(), flate2::Compression::new(self.level));
                encoder.write_all(raw).map_err(CodecError::Compress)?;
                encoder.finish().map_err(CodecError::Compress)?
            }
            CompressionChoice::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(self.level));
                encoder.write_all(raw).map_err(CodecError::Compress)?;
                encoder.finish().map_err(CodecError::Compress)?
            }
            CompressionChoice::Bz2 => {
                let mut encoder = bzip2::write::BzEncoder::new(
                    Vec::new(),
                    bzip2::Compression::new(self.level),
                );
                encoder.write_all(raw).map_err(CodecError::Compress)?;
                encoder.finish().map_err(CodecError::Compress)?
            }
        };
        trace!(
            codec = %self.choice,
            raw = raw.len(),
            compressed = out.len(),
            "compressed payload"
        );
        Ok(Bytes::from(out))
    }

    /// Decompress a payload produced by the peer's codec.
    pub fn decompress(&self, payload: &[u8]) -> Result<Bytes> {
        self.decompress_inner(payload, None)
    }

    /// Decompress, failing once the output would grow past `limit` bytes.
    ///
    /// Receivers that know the expected image size use this to refuse
    /// payloads that inflate far beyond it.
    pub fn decompress_bounded(&self, payload: &[u8], limit: usize) -> Result<Bytes> {
        self.decompress_inner(payload, Some(limit))
    }

    fn decompress_inner(&self, payload: &[u8], limit: Option<usize>) -> Result<Bytes> {
        let mut decoder: Box<dyn Read + '_> = match self.choice {
            CompressionChoice::None => return self.passthrough(payload, limit),
            CompressionChoice::Zlib => Box::new(ZlibDecoder::new(payload)),
            CompressionChoice::Gzip => Box::new(MultiGzDecoder::new(payload)),
            CompressionChoice::Bz2 => Box::new(bzip2::read::MultiBzDecoder::new(payload)),
        };

        if payload.is_empty() {
            return Err(self.corrupt(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "empty compressed stream",
            )));
        }

        let estimate = payload.len().saturating_mul(4);
        let mut out = Vec::with_capacity(limit.map_or(estimate, |limit| limit.min(estimate)));
        match limit {
            Some(limit) => {
                let read = decoder
                    .take((limit as u64).saturating_add(1))
                    .read_to_end(&mut out)
                    .map_err(|e| self.corrupt(e))?;
                if read > limit {
                    return Err(CodecError::OutputTooLarge {
                        choice: self.choice,
                        limit,
                    });
                }
            }
            None => {
                decoder.read_to_end(&mut out).map_err(|e| self.corrupt(e))?;
            }
        }
        Ok(Bytes::from(out))
    }

    fn passthrough(&self, payload: &[u8], limit: Option<usize>) -> Result<Bytes> {
        match limit {
            Some(limit) if payload.len() > limit => Err(CodecError::OutputTooLarge {
                choice: self.choice,
                limit,
            }),
            _ => Ok(Bytes::copy_from_slice(payload)),
        }
    }

    fn corrupt(&self, source: std::io::Error) -> CodecError {
        CodecError::CorruptPayload {
            choice: self.choice,
            source,
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            choice: CompressionChoice::default(),
            level: CompressionChoice::default().default_level(),
        }
    }
}
