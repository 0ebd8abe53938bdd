use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MessageError, Result};

/// Length prefix: a signed 32-bit little-endian integer.
pub const PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Largest payload a signed 32-bit prefix can describe.
const PREFIX_LIMIT: usize = i32::MAX as usize;

/// Configuration for message framing.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Maximum payload size in bytes. Default: 64 MiB. Values above
    /// `i32::MAX` are clamped.
    pub max_payload_size: usize,
    /// Accept zero-length messages. Default: false.
    pub allow_empty: bool,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl MessageConfig {
    /// Effective payload limit after clamping to what the prefix can carry.
    pub fn payload_limit(&self) -> usize {
        self.max_payload_size.min(PREFIX_LIMIT)
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            allow_empty: false,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Encode a message into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────┐
/// │ Length (4B, i32  │ Payload          │
/// │ little-endian)   │ (Length bytes)   │
/// └──────────────────┴──────────────────┘
/// ```
pub fn encode_message(payload: &[u8], config: &MessageConfig, dst: &mut BytesMut) -> Result<()> {
    check_length(payload.len(), config)?;
    dst.reserve(PREFIX_SIZE + payload.len());
    dst.put_i32_le(payload.len() as i32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer. A bad prefix is
/// reported as soon as the 4 prefix bytes are available.
pub fn decode_message(src: &mut BytesMut, config: &MessageConfig) -> Result<Option<Bytes>> {
    if src.len() < PREFIX_SIZE {
        return Ok(None);
    }

    let mut prefix = [0u8; PREFIX_SIZE];
    prefix.copy_from_slice(&src[..PREFIX_SIZE]);
    let declared = i32::from_le_bytes(prefix);
    if declared < 0 {
        return Err(MessageError::NegativeLength(declared));
    }
    let payload_len = declared as usize;
    check_length(payload_len, config)?;

    let total = PREFIX_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(PREFIX_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

fn check_length(len: usize, config: &MessageConfig) -> Result<()> {
    if len == 0 && !config.allow_empty {
        return Err(MessageError::EmptyMessage);
    }
    let max = config.payload_limit();
    if len > max {
        return Err(MessageError::PayloadTooLarge { size: len, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn allow_empty() -> MessageConfig {
        MessageConfig {
            allow_empty: true,
            ..MessageConfig::default()
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let config = MessageConfig::default();
        let mut buf = BytesMut::new();
        let payload = b"hello, slm!";

        encode_message(payload, &config, &mut buf).unwrap();
        assert_eq!(buf.len(), PREFIX_SIZE + payload.len());

        let message = decode_message(&mut buf, &config).unwrap().unwrap();
        assert_eq!(message.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_prefix_is_little_endian_i32() {
        let mut buf = BytesMut::new();
        encode_message(&[7u8; 258], &MessageConfig::default(), &mut buf).unwrap();
        assert_eq!(&buf[..PREFIX_SIZE], &[0x02, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x05, 0x00][..]);
        let result = decode_message(&mut buf, &MessageConfig::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let config = MessageConfig::default();
        let mut buf = BytesMut::new();
        encode_message(b"hello", &config, &mut buf).unwrap();
        buf.truncate(PREFIX_SIZE + 2);

        let result = decode_message(&mut buf, &config).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_negative_length() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(-1);
        let result = decode_message(&mut buf, &MessageConfig::default());
        assert!(matches!(result, Err(MessageError::NegativeLength(-1))));
    }

    #[test]
    fn test_decode_zero_length_rejected_by_default() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(0);
        let result = decode_message(&mut buf, &MessageConfig::default());
        assert!(matches!(result, Err(MessageError::EmptyMessage)));
    }

    #[test]
    fn test_empty_payload_when_allowed() {
        let config = allow_empty();
        let mut buf = BytesMut::new();
        encode_message(b"", &config, &mut buf).unwrap();

        let message = decode_message(&mut buf, &config).unwrap().unwrap();
        assert!(message.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_empty_rejected_by_default() {
        let mut buf = BytesMut::new();
        let result = encode_message(b"", &MessageConfig::default(), &mut buf);
        assert!(matches!(result, Err(MessageError::EmptyMessage)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(128 * 1024 * 1024);

        let result = decode_message(&mut buf, &MessageConfig::default());
        assert!(matches!(result, Err(MessageError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_limit_clamped_to_prefix_range() {
        let config = MessageConfig {
            max_payload_size: usize::MAX,
            ..MessageConfig::default()
        };
        assert_eq!(config.payload_limit(), i32::MAX as usize);
    }

    #[test]
    fn test_multiple_messages() {
        let config = MessageConfig::default();
        let mut buf = BytesMut::new();
        encode_message(b"first", &config, &mut buf).unwrap();
        encode_message(b"second", &config, &mut buf).unwrap();

        let m1 = decode_message(&mut buf, &config).unwrap().unwrap();
        let m2 = decode_message(&mut buf, &config).unwrap().unwrap();
        assert_eq!(m1.as_ref(), b"first");
        assert_eq!(m2.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let config = allow_empty();
            let mut buf = BytesMut::new();
            encode_message(&payload, &config, &mut buf).unwrap();
            let message = decode_message(&mut buf, &config).unwrap().unwrap();
            prop_assert_eq!(message.as_ref(), payload.as_slice());
            prop_assert!(buf.is_empty());
        }
    }
}
