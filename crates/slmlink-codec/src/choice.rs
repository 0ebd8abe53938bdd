use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Level used by zlib and gzip when none is given.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;

/// Highest level any supported algorithm accepts.
pub const MAX_LEVEL: u32 = 9;

/// Compression algorithm applied to message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionChoice {
    /// Payload is sent as-is.
    None,
    /// zlib stream (RFC 1950).
    #[default]
    Zlib,
    /// gzip member (RFC 1952).
    Gzip,
    /// bzip2 stream.
    Bz2,
}

impl CompressionChoice {
    /// All supported choices, in CLI order.
    pub const ALL: [CompressionChoice; 4] = [Self::None, Self::Zlib, Self::Gzip, Self::Bz2];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
            Self::Bz2 => "bz2",
        }
    }

    /// Level used when the caller does not pick one.
    ///
    /// bzip2 defaults to its maximum block size; the deflate family uses the
    /// library default.
    pub fn default_level(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Zlib | Self::Gzip => DEFAULT_DEFLATE_LEVEL,
            Self::Bz2 => MAX_LEVEL,
        }
    }

    /// Resolve an optional caller level into the level the codec will use.
    pub fn resolve_level(self, level: Option<u32>) -> Result<u32> {
        let Some(level) = level else {
            return Ok(self.default_level());
        };
        let (min, max) = match self {
            // Ignored, but still bounded so typos are noticed.
            Self::None | Self::Zlib | Self::Gzip => (0, MAX_LEVEL),
            Self::Bz2 => (1, MAX_LEVEL),
        };
        if level < min || level > max {
            return Err(CodecError::InvalidLevel {
                choice: self,
                level,
                min,
                max,
            });
        }
        Ok(level)
    }
}

impl fmt::Display for CompressionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionChoice {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "zlib" => Ok(Self::Zlib),
            "gzip" => Ok(Self::Gzip),
            "bz2" | "bzip2" => Ok(Self::Bz2),
            other => Err(CodecError::UnknownChoice(other.to_string())),
        }
    }
}
