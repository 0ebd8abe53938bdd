//! Acknowledgement tokens.
//!
//! After each message the receiver may answer with raw text on the same
//! connection: `done` when the frame was applied, `err` when it was
//! rejected. The text is not length-prefixed.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use slmlink_transport::SlmStream;
use slmlink_wire::MessageError;
use tracing::{debug, trace, warn};

use crate::error::Result;

/// Largest chunk read while waiting for an acknowledgement.
pub const ACK_CHUNK_SIZE: usize = 128;

/// Receiver's verdict on one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Done,
    Err,
}

impl Ack {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Done => b"done",
            Self::Err => b"err",
        }
    }

    /// Parse one chunk. Surrounding whitespace and NULs are ignored; anything
    /// else must match exactly.
    pub fn parse(chunk: &[u8]) -> Option<Self> {
        let text = trim(chunk);
        if text == b"done" {
            Some(Self::Done)
        } else if text == b"err" {
            Some(Self::Err)
        } else {
            None
        }
    }

    /// Send this acknowledgement.
    pub fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.as_bytes())?;
        writer.flush()
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Err => f.write_str("err"),
        }
    }
}

fn trim(chunk: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| b.is_ascii_whitespace() || *b == 0;
    let start = chunk.iter().position(|b| !is_pad(b)).unwrap_or(chunk.len());
    let end = chunk.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    &chunk[start..end]
}

/// Throw away whatever is already buffered on the acknowledgement stream.
///
/// A reply that arrives after its attempt timed out would otherwise be read
/// as the answer to the next message. Never blocks; returns the number of
/// bytes discarded.
pub(crate) fn discard_stale(stream: &mut SlmStream) -> Result<usize> {
    stream.set_nonblocking(true)?;
    let drained = drain(stream);
    stream.set_nonblocking(false)?;

    let discarded = drained?;
    if discarded > 0 {
        debug!(bytes = discarded, "discarded stale acknowledgement bytes");
    }
    Ok(discarded)
}

fn drain(stream: &mut SlmStream) -> Result<usize> {
    let mut chunk = [0u8; ACK_CHUNK_SIZE];
    let mut discarded = 0usize;
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Err(MessageError::ConnectionClosed.into()),
            Ok(n) => {
                trace!(text = %String::from_utf8_lossy(&chunk[..n]), "stale acknowledgement");
                discarded += n;
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(discarded),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(MessageError::Io(err).into()),
        }
    }
}

/// Read chunks until an acknowledgement arrives or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout. Unrecognised text is logged and skipped.
/// The stream's read timeout is left cleared.
pub(crate) fn wait_for_ack(stream: &mut SlmStream, timeout: Duration) -> Result<Option<Ack>> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; ACK_CHUNK_SIZE];

    let outcome = loop {
        let now = Instant::now();
        if now >= deadline {
            break None;
        }
        stream.set_read_timeout(Some(deadline - now))?;

        match stream.read(&mut chunk) {
            Ok(0) => {
                stream.set_read_timeout(None)?;
                return Err(MessageError::ConnectionClosed.into());
            }
            Ok(n) => match Ack::parse(&chunk[..n]) {
                Some(ack) => {
                    trace!(%ack, "acknowledgement received");
                    break Some(ack);
                }
                None => warn!(
                    bytes = n,
                    text = %String::from_utf8_lossy(&chunk[..n]),
                    "ignoring unrecognised acknowledgement"
                ),
            },
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                stream.set_read_timeout(None)?;
                return Err(MessageError::Io(err).into());
            }
        }
    };

    stream.set_read_timeout(None)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use slmlink_transport::TcpTransport;

    use super::*;
    use crate::error::PeerError;

    fn loopback_pair() -> (SlmStream, SlmStream) {
        let transport = TcpTransport::bind("127.0.0.1", 0).expect("bind should succeed");
        let port = transport.local_addr().port();
        let client = thread::spawn(move || TcpTransport::connect("127.0.0.1", port, None));
        let server = transport.accept().expect("accept should succeed");
        let client = client
            .join()
            .expect("connect thread should finish")
            .expect("connect should succeed");
        (client, server)
    }

    #[test]
    fn parse_exact_tokens() {
        assert_eq!(Ack::parse(b"done"), Some(Ack::Done));
        assert_eq!(Ack::parse(b"err"), Some(Ack::Err));
        assert_eq!(Ack::parse(b" done\n"), Some(Ack::Done));
        assert_eq!(Ack::parse(b"err\0\0"), Some(Ack::Err));
        assert_eq!(Ack::parse(b"DONE"), None);
        assert_eq!(Ack::parse(b"donee"), None);
        assert_eq!(Ack::parse(b""), None);
    }

    #[test]
    fn waits_for_done() {
        let (mut client, mut server) = loopback_pair();
        let replier = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            Ack::Done.write_to(&mut server).unwrap();
            server
        });

        let ack = wait_for_ack(&mut client, Duration::from_secs(5)).unwrap();
        assert_eq!(ack, Some(Ack::Done));
        replier.join().unwrap();
    }

    #[test]
    fn skips_noise_before_token() {
        let (mut client, mut server) = loopback_pair();
        let replier = thread::spawn(move || {
            server.write_all(b"hello").unwrap();
            server.flush().unwrap();
            thread::sleep(Duration::from_millis(50));
            Ack::Err.write_to(&mut server).unwrap();
            server
        });

        let ack = wait_for_ack(&mut client, Duration::from_secs(5)).unwrap();
        assert_eq!(ack, Some(Ack::Err));
        replier.join().unwrap();
    }

    #[test]
    fn times_out_on_silence() {
        let (mut client, _server) = loopback_pair();
        let start = Instant::now();
        let ack = wait_for_ack(&mut client, Duration::from_millis(80)).unwrap();
        assert_eq!(ack, None);
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn discard_stale_empties_buffered_replies() {
        let (mut client, mut server) = loopback_pair();
        Ack::Done.write_to(&mut server).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(discard_stale(&mut client).unwrap(), 4);
        assert_eq!(discard_stale(&mut client).unwrap(), 0);

        // The stream is blocking again: a fresh reply is still waited for.
        let replier = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            Ack::Err.write_to(&mut server).unwrap();
            server
        });
        let ack = wait_for_ack(&mut client, Duration::from_secs(5)).unwrap();
        assert_eq!(ack, Some(Ack::Err));
        replier.join().unwrap();
    }

    #[test]
    fn discard_stale_reports_hangup() {
        let (mut client, server) = loopback_pair();
        drop(server);
        thread::sleep(Duration::from_millis(50));
        let err = discard_stale(&mut client).unwrap_err();
        assert!(matches!(err, PeerError::Wire(MessageError::ConnectionClosed)));
    }

    #[test]
    fn peer_hangup_is_connection_closed() {
        let (mut client, server) = loopback_pair();
        drop(server);
        let err = wait_for_ack(&mut client, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(
            err,
            PeerError::Wire(MessageError::ConnectionClosed)
        ));
    }
}
