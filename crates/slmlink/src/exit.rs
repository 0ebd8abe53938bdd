use std::fmt;
use std::io;

use slmlink_codec::CodecError;
use slmlink_display::DisplayError;
use slmlink_peer::{AttemptFailure, PeerError};
use slmlink_transport::TransportError;
use slmlink_wire::MessageError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { .. } | TransportError::Bind { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Resolve { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn message_error(context: &str, err: MessageError) -> CliError {
    match err {
        MessageError::Io(source) => io_error(context, source),
        MessageError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        MessageError::NegativeLength(_)
        | MessageError::EmptyMessage
        | MessageError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::InvalidLevel { .. } | CodecError::UnknownChoice(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        CodecError::Compress(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn display_error(context: &str, err: DisplayError) -> CliError {
    match err {
        DisplayError::InvalidInput(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        DisplayError::MonitorOutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Wire(err) => message_error(context, err),
        PeerError::Codec(err) => codec_error(context, err),
        PeerError::Display(err) => display_error(context, err),
        PeerError::InvalidInput(_) | PeerError::SizeMismatch { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PeerError::DeliveryFailed {
            last: AttemptFailure::Timeout(_),
            ..
        } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PeerError::DeliveryFailed { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn delivery_timeout_maps_to_timeout_code() {
        let err = PeerError::DeliveryFailed {
            attempts: 2,
            last: AttemptFailure::Timeout(Duration::from_millis(100)),
        };
        assert_eq!(peer_error("send failed", err).code, TIMEOUT);
    }

    #[test]
    fn negative_ack_maps_to_failure() {
        let err = PeerError::DeliveryFailed {
            attempts: 2,
            last: AttemptFailure::NegativeAck,
        };
        let cli = peer_error("send failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("send failed: delivery failed after 2"));
    }

    #[test]
    fn connect_failure_is_transport_error() {
        let err = PeerError::Transport(TransportError::Connect {
            addr: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(peer_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn framing_violation_is_data_invalid() {
        let err = PeerError::Wire(MessageError::NegativeLength(-1));
        assert_eq!(peer_error("receive failed", err).code, DATA_INVALID);
    }

    #[test]
    fn invalid_level_is_usage() {
        let err = slmlink_codec::CompressionChoice::Zlib
            .resolve_level(Some(11))
            .unwrap_err();
        assert_eq!(codec_error("bad level", err).code, USAGE);
    }
}
