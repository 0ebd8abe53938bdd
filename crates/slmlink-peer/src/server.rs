//! Receiving side.
//!
//! A [`StreamSession`] decodes one message at a time and checks it against
//! the expected frame shape. [`StreamServer::serve_with`] accepts clients in
//! turn and lets the caller decide how each frame is answered.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slmlink_codec::{Codec, CompressionChoice};
use slmlink_display::{Frame, FrameMailbox, FrameShape};
use slmlink_transport::{SlmStream, TcpTransport, TransportError, DEFAULT_PORT};
use slmlink_wire::{MessageConfig, MessageReader, DEFAULT_MAX_PAYLOAD};
use tracing::{debug, info, warn};

use crate::ack::Ack;
use crate::error::{PeerError, Result};

/// How often `serve` checks its stop flag while idle.
pub const DEFAULT_SERVE_POLL: Duration = Duration::from_millis(100);

/// Receiving side configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shape every received frame must have.
    pub expected: FrameShape,
    /// Must match the sender's codec.
    pub compression: CompressionChoice,
    /// Answer `done`/`err` after each message.
    pub confirm: bool,
    pub max_payload_size: usize,
    pub poll_interval: Duration,
}

impl ServerConfig {
    pub fn new(expected: FrameShape) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            expected,
            compression: CompressionChoice::default(),
            confirm: true,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            poll_interval: DEFAULT_SERVE_POLL,
        }
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_compression(mut self, compression: CompressionChoice) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Counters reported when `serve` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServeSummary {
    pub sessions: u64,
    /// Frames answered `done`.
    pub frames: u64,
    /// Messages answered `err`, by the session or by the frame callback.
    pub rejected: u64,
}

/// Listens for stream clients and turns their messages back into frames.
pub struct StreamServer {
    transport: TcpTransport,
    config: ServerConfig,
    codec: Codec,
}

impl StreamServer {
    pub fn bind(config: ServerConfig) -> Result<Self> {
        // Decompression ignores the level.
        let codec = Codec::new(config.compression, None)?;
        let transport = TcpTransport::bind(&config.host, config.port)?;
        Ok(Self {
            transport,
            config,
            codec,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept one client (blocking).
    pub fn accept(&self) -> Result<StreamSession> {
        let stream = self.transport.accept()?;
        self.session(stream)
    }

    fn session(&self, stream: SlmStream) -> Result<StreamSession> {
        let peer = stream.peer_addr()?;
        let ack = stream.try_clone()?;
        let message_config = MessageConfig {
            max_payload_size: self.config.max_payload_size,
            ..MessageConfig::default()
        };
        let reader = MessageReader::with_config_stream(stream, message_config)?;
        info!(%peer, expected = %self.config.expected, "client connected");
        Ok(StreamSession {
            reader,
            ack,
            peer,
            codec: self.codec,
            expected: self.config.expected,
            confirm: self.config.confirm,
            received: 0,
        })
    }

    /// Receive frames into `mailbox` until `stop` is set.
    pub fn serve(&self, mailbox: &FrameMailbox, stop: &AtomicBool) -> Result<ServeSummary> {
        self.serve_with(stop, |frame, _peer| {
            mailbox.put(frame);
            ControlFlow::Continue(Ack::Done)
        })
    }

    /// Accept clients one at a time and hand every good frame, with the
    /// sending peer's address, to `on_frame` until `stop` is set or the
    /// callback breaks.
    ///
    /// The callback's value is the acknowledgement sent for that frame, so
    /// the peer only hears `done` once the frame was actually taken.
    /// `Break` answers the frame and then stops serving. The stop flag is
    /// checked at least once per poll interval.
    pub fn serve_with<F>(&self, stop: &AtomicBool, mut on_frame: F) -> Result<ServeSummary>
    where
        F: FnMut(Frame, SocketAddr) -> ControlFlow<Ack, Ack>,
    {
        let poll = self.config.poll_interval;
        let mut summary = ServeSummary::default();
        self.transport.set_nonblocking(true)?;

        while !stop.load(Ordering::SeqCst) {
            let stream = match self.transport.accept() {
                Ok(stream) => stream,
                Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(poll);
                    continue;
                }
                Err(TransportError::Accept(err)) if err.kind() == ErrorKind::Interrupted => {
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let mut session = match self.session(stream) {
                Ok(session) => session,
                Err(err) => {
                    warn!(error = %err, "failed to set up session");
                    continue;
                }
            };
            summary.sessions += 1;
            session.reader.get_ref().set_read_timeout(Some(poll))?;

            let flow = drive_session(&mut session, stop, &mut summary, &mut on_frame);
            info!(peer = %session.peer, frames = session.received, "client disconnected");
            if flow.is_break() {
                break;
            }
        }

        self.transport.set_nonblocking(false)?;
        Ok(summary)
    }
}

fn drive_session<F>(
    session: &mut StreamSession,
    stop: &AtomicBool,
    summary: &mut ServeSummary,
    on_frame: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(Frame, SocketAddr) -> ControlFlow<Ack, Ack>,
{
    while !stop.load(Ordering::SeqCst) {
        match session.read_frame() {
            Ok(frame) => {
                let (ack, last) = match on_frame(frame, session.peer) {
                    ControlFlow::Continue(ack) => (ack, false),
                    ControlFlow::Break(ack) => (ack, true),
                };
                match ack {
                    Ack::Done => summary.frames += 1,
                    Ack::Err => summary.rejected += 1,
                }
                if let Err(err) = session.acknowledge(ack) {
                    warn!(peer = %session.peer, error = %err, "failed to acknowledge frame");
                    return if last {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    };
                }
                if last {
                    return ControlFlow::Break(());
                }
            }
            Err(err) if err.is_timeout() => {}
            Err(err) if err.is_recoverable() => {
                summary.rejected += 1;
                warn!(peer = %session.peer, error = %err, "rejected frame");
            }
            Err(PeerError::Wire(slmlink_wire::MessageError::ConnectionClosed)) => {
                return ControlFlow::Continue(());
            }
            Err(err) => {
                warn!(peer = %session.peer, error = %err, "closing session");
                return ControlFlow::Continue(());
            }
        }
    }
    ControlFlow::Break(())
}

impl std::fmt::Debug for StreamServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamServer")
            .field("addr", &self.local_addr())
            .field("config", &self.config)
            .finish()
    }
}

/// One connected client.
pub struct StreamSession {
    reader: MessageReader<SlmStream>,
    ack: SlmStream,
    peer: SocketAddr,
    codec: Codec,
    expected: FrameShape,
    confirm: bool,
    received: u64,
}

impl StreamSession {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Frames decoded so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Read one message, turn it into a frame and answer `done`.
    ///
    /// A payload that fails to decompress or has the wrong size is answered
    /// with `err` and reported as a recoverable error; the session stays
    /// usable. Framing errors and end of stream are fatal.
    pub fn recv_frame(&mut self) -> Result<Frame> {
        let frame = self.read_frame()?;
        self.acknowledge(Ack::Done)?;
        Ok(frame)
    }

    /// Like [`StreamSession::recv_frame`], but a good frame is left
    /// unanswered. The caller must [`acknowledge`](Self::acknowledge) it
    /// before reading the next one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let payload = self.reader.read_message()?;
        let expected_len = self.expected.byte_len();

        let raw = match self.codec.decompress_bounded(&payload, expected_len) {
            Ok(raw) => raw,
            Err(err) => {
                self.reply(Ack::Err)?;
                return Err(err.into());
            }
        };
        if raw.len() != expected_len {
            self.reply(Ack::Err)?;
            return Err(PeerError::SizeMismatch {
                expected: expected_len,
                got: raw.len(),
            });
        }

        let frame = Frame::new(self.expected, raw)?;
        self.received += 1;
        debug!(peer = %self.peer, bytes = payload.len(), "frame received");
        Ok(frame)
    }

    /// Answer the frame returned by [`StreamSession::read_frame`]. Nothing
    /// is written when the server does not confirm.
    pub fn acknowledge(&mut self, ack: Ack) -> Result<()> {
        self.reply(ack)
    }

    fn reply(&mut self, ack: Ack) -> Result<()> {
        if self.confirm {
            ack.write_to(&mut self.ack)
                .map_err(|e| PeerError::Wire(slmlink_wire::MessageError::Io(e)))?;
        }
        Ok(())
    }

    /// Shut down both directions.
    pub fn close(self) -> Result<()> {
        self.ack.shutdown()?;
        Ok(())
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("peer", &self.peer)
            .field("expected", &self.expected)
            .field("received", &self.received)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use slmlink_wire::MessageWriter;

    use super::*;
    use crate::client::{ClientConfig, StreamClient};
    use crate::error::AttemptFailure;

    fn shape() -> FrameShape {
        FrameShape::mono(16, 8).unwrap()
    }

    fn loopback_server(config: ServerConfig) -> StreamServer {
        StreamServer::bind(config.with_address("127.0.0.1", 0)).unwrap()
    }

    #[test]
    fn client_and_session_interoperate() {
        let server = loopback_server(ServerConfig::new(shape()));
        let port = server.local_addr().port();

        let receiver = thread::spawn(move || {
            let mut session = server.accept().unwrap();
            let frame = session.recv_frame().unwrap();
            assert_eq!(session.received(), 1);
            frame
        });

        let mut client = StreamClient::connect_to("127.0.0.1", port).unwrap();
        let sent = Frame::filled(shape(), 42);
        let report = client.send(&sent).unwrap();
        assert!(report.confirmed);

        assert_eq!(receiver.join().unwrap(), sent);
        client.close().unwrap();
    }

    #[test]
    fn size_mismatch_answers_err_and_keeps_session() {
        let server = loopback_server(ServerConfig::new(shape()));
        let port = server.local_addr().port();

        let receiver = thread::spawn(move || {
            let mut session = server.accept().unwrap();
            let err = session.recv_frame().unwrap_err();
            assert!(matches!(
                err,
                PeerError::SizeMismatch {
                    expected: 128,
                    got: 4
                }
            ));
            assert!(err.is_recoverable());
            session.recv_frame().unwrap()
        });

        let mut client = StreamClient::connect_to("127.0.0.1", port).unwrap();
        let wrong = Frame::filled(FrameShape::mono(2, 2).unwrap(), 1);
        let err = client
            .send_frame(&wrong, Duration::from_secs(5), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            PeerError::DeliveryFailed {
                last: AttemptFailure::NegativeAck,
                ..
            }
        ));

        let right = Frame::filled(shape(), 7);
        client.send(&right).unwrap();
        assert_eq!(receiver.join().unwrap(), right);
    }

    #[test]
    fn codec_mismatch_is_recoverable() {
        let server = loopback_server(ServerConfig::new(shape()).with_compression(CompressionChoice::Bz2));
        let port = server.local_addr().port();

        let receiver = thread::spawn(move || {
            let mut session = server.accept().unwrap();
            let err = session.recv_frame().unwrap_err();
            assert!(matches!(err, PeerError::Codec(_)));
            assert!(err.is_recoverable());
        });

        let mut client = StreamClient::connect_to("127.0.0.1", port).unwrap();
        let err = client
            .send_frame(&Frame::filled(shape(), 3), Duration::from_secs(5), 1)
            .unwrap_err();
        assert!(matches!(err, PeerError::DeliveryFailed { .. }));
        receiver.join().unwrap();
    }

    #[test]
    fn negative_prefix_is_fatal() {
        let server = loopback_server(ServerConfig::new(shape()));
        let port = server.local_addr().port();

        let receiver = thread::spawn(move || {
            let mut session = server.accept().unwrap();
            let err = session.recv_frame().unwrap_err();
            assert!(matches!(
                err,
                PeerError::Wire(slmlink_wire::MessageError::NegativeLength(-5))
            ));
            assert!(!err.is_recoverable());
        });

        let mut stream = TcpTransport::connect("127.0.0.1", port, None).unwrap();
        std::io::Write::write_all(&mut stream, &(-5i32).to_le_bytes()).unwrap();
        receiver.join().unwrap();
    }

    #[test]
    fn serve_feeds_mailbox_and_stops_on_flag() {
        let server = loopback_server(
            ServerConfig::new(shape()).with_poll_interval(Duration::from_millis(20)),
        );
        let port = server.local_addr().port();
        let mailbox = Arc::new(FrameMailbox::new());
        let stop = Arc::new(AtomicBool::new(false));

        let serving = {
            let mailbox = Arc::clone(&mailbox);
            let stop = Arc::clone(&stop);
            thread::spawn(move || server.serve(&mailbox, &stop))
        };

        let mut client = StreamClient::connect_to("127.0.0.1", port).unwrap();
        for value in 1..=3 {
            client.send(&Frame::filled(shape(), value)).unwrap();
        }
        let latest = Frame::filled(shape(), 3);
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let delivery = mailbox.take(Duration::from_millis(100));
            if delivery.is_some_and(|d| d.frame == latest) {
                break;
            }
            assert!(Instant::now() < deadline, "last frame never arrived");
        }

        let start = Instant::now();
        stop.store(true, Ordering::SeqCst);
        let summary = serving.join().unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.sessions, 1);
        assert_eq!(summary.frames, 3);
        client.close().unwrap();
    }

    #[test]
    fn serve_with_breaks_after_callback() {
        let server = loopback_server(
            ServerConfig::new(shape()).with_poll_interval(Duration::from_millis(20)),
        );
        let port = server.local_addr().port();
        let stop = AtomicBool::new(false);

        let sender = thread::spawn(move || {
            let mut client = StreamClient::connect(
                ClientConfig::new("127.0.0.1", port).with_timeout(Duration::from_secs(5)),
            )
            .unwrap();
            client.send(&Frame::filled(shape(), 1)).unwrap();
            client.send(&Frame::filled(shape(), 2)).unwrap();
            client.close()
        });

        let mut seen = Vec::new();
        let summary = server
            .serve_with(&stop, |frame, peer| {
                assert!(peer.ip().is_loopback());
                seen.push(frame.as_bytes()[0]);
                if seen.len() == 2 {
                    ControlFlow::Break(Ack::Done)
                } else {
                    ControlFlow::Continue(Ack::Done)
                }
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(summary.frames, 2);
        sender.join().unwrap().unwrap();
    }

    #[test]
    fn callback_verdict_is_the_acknowledgement() {
        let server = loopback_server(
            ServerConfig::new(shape()).with_poll_interval(Duration::from_millis(20)),
        );
        let port = server.local_addr().port();
        let stop = AtomicBool::new(false);

        let sender = thread::spawn(move || {
            let mut client = StreamClient::connect_to("127.0.0.1", port).unwrap();
            let refused = client
                .send_frame(&Frame::filled(shape(), 1), Duration::from_secs(5), 1)
                .unwrap_err();
            let accepted = client
                .send_frame(&Frame::filled(shape(), 2), Duration::from_secs(5), 1)
                .unwrap();
            let _ = client.close();
            (refused, accepted)
        });

        let summary = server
            .serve_with(&stop, |frame, _peer| {
                if frame.as_bytes()[0] == 1 {
                    ControlFlow::Continue(Ack::Err)
                } else {
                    ControlFlow::Break(Ack::Done)
                }
            })
            .unwrap();

        let (refused, accepted) = sender.join().unwrap();
        assert!(matches!(
            refused,
            PeerError::DeliveryFailed {
                attempts: 1,
                last: AttemptFailure::NegativeAck
            }
        ));
        assert!(accepted.confirmed);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn unconfirmed_server_stays_silent() {
        let server = loopback_server(ServerConfig::new(shape()).with_confirm(false));
        let port = server.local_addr().port();

        let receiver = thread::spawn(move || {
            let mut session = server.accept().unwrap();
            session.recv_frame().unwrap();
            session.close().unwrap();
        });

        let stream = TcpTransport::connect("127.0.0.1", port, None).unwrap();
        let mut ack = stream.try_clone().unwrap();
        let mut writer = MessageWriter::new(stream);
        let payload = Codec::default().compress(&[9u8; 128]).unwrap();
        writer.send(&payload).unwrap();
        receiver.join().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(std::io::Read::read(&mut ack, &mut buf).unwrap(), 0);
    }
}
