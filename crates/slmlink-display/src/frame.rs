//! Captured image frames.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DisplayError, Result};

/// Channel counts a frame may carry.
const SUPPORTED_CHANNELS: [u8; 3] = [1, 3, 4];

/// Element type of caller-provided array memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Width, height and channel count of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl FrameShape {
    /// Validated shape. Zero dimensions, channel counts other than 1, 3
    /// or 4, and shapes whose byte length does not fit in memory are
    /// rejected.
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DisplayError::InvalidInput(format!(
                "frame dimensions must be non-zero (got {width}x{height})"
            )));
        }
        if !SUPPORTED_CHANNELS.contains(&channels) {
            return Err(DisplayError::InvalidInput(format!(
                "unsupported channel count {channels} (expected 1, 3 or 4)"
            )));
        }
        let fits = checked_byte_len(width, height, channels)
            .is_some_and(|len| len <= isize::MAX as usize);
        if !fits {
            return Err(DisplayError::InvalidInput(format!(
                "frame {width}x{height}x{channels} is too large"
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
        })
    }

    /// Monochrome shape.
    pub fn mono(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, 1)
    }

    /// Number of bytes a frame of this shape holds.
    ///
    /// Saturates for shapes built by hand past what [`FrameShape::new`]
    /// accepts, so no frame ever matches them.
    pub fn byte_len(&self) -> usize {
        checked_byte_len(self.width, self.height, self.channels).unwrap_or(usize::MAX)
    }

    /// Infer a shape from row-major array dimensions: `[height, width]` is
    /// monochrome, `[height, width, channels]` carries `channels`.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        let (height, width, channels) = match *dims {
            [height, width] => (height, width, 1),
            [height, width, channels] => (height, width, channels),
            _ => {
                return Err(DisplayError::InvalidInput(format!(
                    "expected a 2-D or 3-D array, got {} dimensions",
                    dims.len()
                )))
            }
        };
        let to_u32 = |value: usize, what: &str| {
            u32::try_from(value).map_err(|_| {
                DisplayError::InvalidInput(format!("{what} {value} does not fit in 32 bits"))
            })
        };
        let channels = u8::try_from(channels).map_err(|_| {
            DisplayError::InvalidInput(format!("unsupported channel count {channels}"))
        })?;
        Self::new(to_u32(width, "width")?, to_u32(height, "height")?, channels)
    }
}

fn checked_byte_len(width: u32, height: u32, channels: u8) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// A borrowed view of caller array memory, with its element type and
/// row-major dimensions.
#[derive(Debug, Clone, Copy)]
pub struct ArrayRef<'a> {
    pub element_type: ElementType,
    pub dims: &'a [usize],
    pub data: &'a [u8],
}

impl<'a> ArrayRef<'a> {
    pub fn new(element_type: ElementType, dims: &'a [usize], data: &'a [u8]) -> Self {
        Self {
            element_type,
            dims,
            data,
        }
    }

    /// View over `u8` samples.
    pub fn u8(dims: &'a [usize], data: &'a [u8]) -> Self {
        Self::new(ElementType::U8, dims, data)
    }
}

/// An immutable 2-D grid of `u8` samples.
///
/// The bytes are row-major with channels interleaved. A frame built from
/// borrowed memory owns a copy, so the producer may reuse its buffer
/// immediately. Clones share the same storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    shape: FrameShape,
    data: Bytes,
}

impl Frame {
    /// Build a frame from owned bytes, checking the length against the shape.
    pub fn new(shape: FrameShape, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() != shape.byte_len() {
            return Err(DisplayError::InvalidInput(format!(
                "frame {shape} needs {} bytes, got {}",
                shape.byte_len(),
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Copy borrowed bytes into a new frame.
    pub fn capture(shape: FrameShape, data: &[u8]) -> Result<Self> {
        if data.len() != shape.byte_len() {
            return Err(DisplayError::InvalidInput(format!(
                "frame {shape} needs {} bytes, got {}",
                shape.byte_len(),
                data.len()
            )));
        }
        Ok(Self {
            shape,
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Capture a typed array view. Anything but `u8` elements is rejected.
    pub fn from_array(array: ArrayRef<'_>) -> Result<Self> {
        if array.element_type != ElementType::U8 {
            return Err(DisplayError::InvalidInput(format!(
                "array must be uint8, got {}",
                array.element_type
            )));
        }
        let shape = FrameShape::from_dims(array.dims)?;
        Self::capture(shape, array.data)
    }

    /// A frame with every sample set to `value`.
    pub fn filled(shape: FrameShape, value: u8) -> Self {
        Self {
            shape,
            data: Bytes::from(vec![value; shape.byte_len()]),
        }
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn channels(&self) -> u8 {
        self.shape.channels
    }

    /// Raw row-major bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the raw bytes.
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One row of samples (all channels interleaved).
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.shape.height {
            return None;
        }
        let stride = self.shape.width as usize * self.shape.channels as usize;
        let start = y as usize * stride;
        Some(&self.data[start..start + stride])
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("shape", &self.shape)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_shape_from_two_dims() {
        let shape = FrameShape::from_dims(&[600, 800]).unwrap();
        assert_eq!(shape, FrameShape::new(800, 600, 1).unwrap());
        assert_eq!(shape.byte_len(), 480_000);
    }

    #[test]
    fn colour_shape_from_three_dims() {
        let shape = FrameShape::from_dims(&[2, 3, 3]).unwrap();
        assert_eq!((shape.width, shape.height, shape.channels), (3, 2, 3));
    }

    #[test]
    fn rejects_bad_rank_and_channels() {
        assert!(FrameShape::from_dims(&[10]).is_err());
        assert!(FrameShape::from_dims(&[1, 2, 3, 4]).is_err());
        assert!(FrameShape::from_dims(&[2, 2, 2]).is_err());
        assert!(FrameShape::from_dims(&[0, 2]).is_err());
    }

    #[test]
    fn rejects_shapes_too_large_to_hold() {
        let err = FrameShape::new(u32::MAX, u32::MAX, 4).unwrap_err();
        assert!(matches!(err, DisplayError::InvalidInput(msg) if msg.contains("too large")));
        assert!(FrameShape::from_dims(&[u32::MAX as usize, u32::MAX as usize, 3]).is_err());

        let by_hand = FrameShape {
            width: u32::MAX,
            height: u32::MAX,
            channels: 4,
        };
        assert_eq!(by_hand.byte_len(), usize::MAX);
        assert!(Frame::capture(by_hand, &[0u8; 4]).is_err());
    }

    #[test]
    fn from_array_copies_bytes() {
        let mut buffer = vec![1u8, 2, 3, 4, 5, 6];
        let frame = Frame::from_array(ArrayRef::u8(&[2, 3], &buffer)).unwrap();
        buffer[0] = 99;
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.row(1).unwrap(), &[4, 5, 6]);
        assert!(frame.row(2).is_none());
    }

    #[test]
    fn from_array_rejects_non_u8() {
        let data = [0u8; 8];
        let err = Frame::from_array(ArrayRef::new(ElementType::U16, &[2, 2], &data)).unwrap_err();
        assert!(matches!(err, DisplayError::InvalidInput(msg) if msg.contains("uint16")));
    }

    #[test]
    fn length_must_match_shape() {
        let shape = FrameShape::mono(4, 4).unwrap();
        assert!(Frame::new(shape, vec![0u8; 15]).is_err());
        assert!(Frame::capture(shape, &[0u8; 17]).is_err());
        assert_eq!(Frame::new(shape, vec![0u8; 16]).unwrap().len(), 16);
    }

    #[test]
    fn filled_frame() {
        let frame = Frame::filled(FrameShape::new(2, 2, 3).unwrap(), 7);
        assert_eq!(frame.len(), 12);
        assert!(frame.as_bytes().iter().all(|b| *b == 7));
    }
}
