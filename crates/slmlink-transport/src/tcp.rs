use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SlmStream;

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 9999;

/// TCP transport.
///
/// Provides bind/accept/connect over IPv4 and IPv6. Every stream it hands
/// out is in low-latency mode.
pub struct TcpTransport {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `host:port`.
    ///
    /// Port 0 binds an ephemeral port; use [`TcpTransport::local_addr`] to
    /// discover it.
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let label = format!("{host}:{port}");
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpListener::bind(addr) {
                Ok(listener) => {
                    let addr = listener.local_addr().map_err(|e| TransportError::Bind {
                        addr: label.clone(),
                        source: e,
                    })?;
                    info!(%addr, "listening on tcp socket");
                    return Ok(Self { listener, addr });
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Bind {
            addr: label,
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address to bind")),
        })
    }

    /// Accept an incoming connection (blocking unless non-blocking mode is set).
    pub fn accept(&self) -> Result<SlmStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        // Accepted sockets may inherit non-blocking mode from the listener.
        stream.set_nonblocking(false)?;
        debug!(%peer, "accepted connection");
        SlmStream::from_tcp(stream)
    }

    /// Put the listener in non-blocking mode so `accept` returns `WouldBlock`
    /// instead of waiting. Used by loops that poll a stop flag.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking).map_err(Into::into)
    }

    /// Connect to a listening peer (blocking).
    ///
    /// Every address `host` resolves to is tried in order. With a
    /// `connect_timeout`, each attempt is bounded by it.
    pub fn connect(host: &str, port: u16, connect_timeout: Option<Duration>) -> Result<SlmStream> {
        let label = format!("{host}:{port}");
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected to tcp socket");
                    return SlmStream::from_tcp(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            addr: label,
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address to connect")),
        })
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve {
            addr: format!("{host}:{port}"),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            addr: format!("{host}:{port}"),
        });
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect("127.0.0.1", port, None).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_streams_are_low_latency() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let client = TcpTransport::connect("127.0.0.1", port, Some(Duration::from_secs(1))).unwrap();
        let server = listener.accept().unwrap();

        assert!(client.nodelay().unwrap());
        assert!(server.nodelay().unwrap());
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port with nothing listening on it.
        let port = {
            let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
            listener.local_addr().port()
        };

        let result = TcpTransport::connect("127.0.0.1", port, Some(Duration::from_millis(500)));
        let err = result.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_unresolvable_host() {
        let result = TcpTransport::connect("no such host.invalid", 9999, None);
        assert!(matches!(result, Err(TransportError::Resolve { .. })));
    }

    #[test]
    fn test_shutdown_reaches_peer() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let client = TcpTransport::connect("127.0.0.1", port, None).unwrap();
        let mut server = listener.accept().unwrap();

        client.shutdown().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
        // A second shutdown after the peer is gone is not an error.
        let _ = client.shutdown();
    }

    #[test]
    fn test_nonblocking_read_would_block() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();

        let mut client = TcpTransport::connect("127.0.0.1", port, None).unwrap();
        let _server = listener.accept().unwrap();

        client.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 4];
        let err = client.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
        client.set_nonblocking(false).unwrap();
    }

    #[test]
    fn test_nonblocking_accept_would_block() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        listener.set_nonblocking(true).unwrap();

        let err = listener.accept().unwrap_err();
        assert!(
            matches!(err, TransportError::Accept(ref e) if e.kind() == std::io::ErrorKind::WouldBlock)
        );
    }
}
