//! The byte-level connection a session talks over.
//!
//! The session never opens sockets itself. It asks a [`Transport`] to connect to an
//! [`Address`], reads and writes bytes through the `Read`/`Write` impls, and uses
//! [`Transport::is_stale`] to find out whether a kept-alive connection was closed by
//! the peer while idle.
//!
//! Timeouts and TLS belong to the transport.

use std::fmt;
use std::io;

/// Host and port to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Address {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Address {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A connection that can be opened, checked for staleness and closed.
///
/// Reads and writes go through the `std::io` supertraits. Implementations decide on
/// buffering, timeouts and encryption.
pub trait Transport: io::Read + io::Write {
    /// Open a connection to `address`.
    ///
    /// Called only when the transport is not connected.
    fn connect(&mut self, address: &Address) -> io::Result<()>;

    /// Close the connection. Closing an unconnected transport is a no-op.
    fn close(&mut self);

    /// Whether there is an open connection.
    fn is_connected(&self) -> bool;

    /// Check whether the peer closed the connection.
    ///
    /// Must not consume any application bytes. Unsolicited bytes from the
    /// peer on an idle connection also count as stale.
    fn is_stale(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn connect(&mut self, address: &Address) -> io::Result<()> {
        (**self).connect(address)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn is_stale(&mut self) -> bool {
        (**self).is_stale()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, address: &Address) -> io::Result<()> {
        (**self).connect(address)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn is_stale(&mut self) -> bool {
        (**self).is_stale()
    }
}

#[cfg(feature = "tcp")]
pub use tcp::{TcpConfig, TcpTransport};

#[cfg(feature = "tcp")]
mod tcp {
    use std::io::{self, Read, Write};
    use std::net::{Shutdown, TcpStream, ToSocketAddrs};
    use std::time::Duration;

    use super::{Address, Transport};

    /// Configuration of a [`TcpTransport`].
    #[derive(Debug, Clone)]
    pub struct TcpConfig {
        /// Timeout for each connect attempt. `None` uses the OS default.
        pub connect_timeout: Option<Duration>,
        /// Timeout for a single read. `None` blocks indefinitely.
        pub read_timeout: Option<Duration>,
        /// Timeout for a single write. `None` blocks indefinitely.
        pub write_timeout: Option<Duration>,
        /// Set `TCP_NODELAY` on the socket.
        pub nodelay: bool,
    }

    impl Default for TcpConfig {
        fn default() -> Self {
            TcpConfig {
                connect_timeout: Some(Duration::from_secs(30)),
                read_timeout: Some(Duration::from_secs(60)),
                write_timeout: Some(Duration::from_secs(60)),
                nodelay: true,
            }
        }
    }

    /// Plain TCP transport over `std::net::TcpStream`.
    #[derive(Debug, Default)]
    pub struct TcpTransport {
        config: TcpConfig,
        stream: Option<TcpStream>,
    }

    impl TcpTransport {
        /// Create an unconnected transport.
        pub fn new(config: TcpConfig) -> Self {
            TcpTransport {
                config,
                stream: None,
            }
        }

        /// The configuration in use.
        pub fn config(&self) -> &TcpConfig {
            &self.config
        }

        fn stream(&mut self) -> io::Result<&mut TcpStream> {
            self.stream
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not connected"))
        }

        fn open(&self, address: &Address) -> io::Result<TcpStream> {
            let mut last_err = None;

            for addr in (address.host.as_str(), address.port).to_socket_addrs()? {
                let result = match self.config.connect_timeout {
                    Some(t) => TcpStream::connect_timeout(&addr, t),
                    None => TcpStream::connect(addr),
                };

                match result {
                    Ok(stream) => return Ok(stream),
                    Err(e) => {
                        debug!("Connect to {} failed: {}", addr, e);
                        last_err = Some(e);
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no addresses for {}", address),
                )
            }))
        }
    }

    impl Transport for TcpTransport {
        fn connect(&mut self, address: &Address) -> io::Result<()> {
            let stream = self.open(address)?;

            stream.set_read_timeout(self.config.read_timeout)?;
            stream.set_write_timeout(self.config.write_timeout)?;
            stream.set_nodelay(self.config.nodelay)?;

            self.stream = Some(stream);
            Ok(())
        }

        fn close(&mut self) {
            if let Some(stream) = self.stream.take() {
                // The peer might already have gone away.
                let _ = stream.shutdown(Shutdown::Both);
            }
        }

        fn is_connected(&self) -> bool {
            self.stream.is_some()
        }

        fn is_stale(&mut self) -> bool {
            let Some(stream) = &self.stream else {
                return true;
            };

            if stream.set_nonblocking(true).is_err() {
                return true;
            }

            let mut buf = [0_u8; 1];
            let stale = match stream.peek(&mut buf) {
                // EOF, the peer closed.
                Ok(0) => true,
                // Unsolicited bytes on an idle connection, the stream is out of sync.
                Ok(_) => true,
                Err(e) => e.kind() != io::ErrorKind::WouldBlock,
            };

            if stream.set_nonblocking(false).is_err() {
                return true;
            }

            stale
        }
    }

    impl Read for TcpTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.stream()?.read(buf)
        }
    }

    impl Write for TcpTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.stream()?.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.stream()?.flush()
        }
    }

}
