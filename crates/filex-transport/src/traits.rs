use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected byte stream to one peer. Implements `Read + Write`.
///
/// The stream has no message boundaries of its own; framing is layered on
/// top by `filex-frame`. A `Connection` is owned by exactly one session (or
/// one client dispatcher) for its lifetime. Use [`Connection::try_clone`] to
/// split it into independent read and write halves.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl Connection {
    pub(crate) fn from_tcp(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Into::into)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Toggle non-blocking mode (shared with every clone of this stream).
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.stream.set_nonblocking(nonblocking).map_err(Into::into)
    }

    /// Shut down both directions. Errors from an already-closed socket are ignored.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.stream.try_clone()?;
        Ok(Self::from_tcp(cloned, self.peer))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
