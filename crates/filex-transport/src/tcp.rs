use std::fmt::Display;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connection;

/// TCP listener transport.
///
/// Provides bind/accept over IPv4 or IPv6, plus a blocking [`TcpTransport::connect`]
/// for the client side.
pub struct TcpTransport {
    listener: TcpListener,
    local: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr`. Port `0` picks an ephemeral port; read it
    /// back with [`TcpTransport::local_addr`].
    pub fn bind<A: ToSocketAddrs + Display>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local, "listening on tcp");

        Ok(Self { listener, local })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(Connection::from_tcp(stream, peer))
    }

    /// Connect to a listening server (blocking).
    pub fn connect<A: ToSocketAddrs + Display>(addr: A) -> Result<Connection> {
        let resolved: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?
            .collect();
        if resolved.is_empty() {
            return Err(TransportError::Unresolved(addr.to_string()));
        }

        let stream = TcpStream::connect(&resolved[..]).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        let peer = stream.peer_addr().map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(%peer, "connected to tcp server");
        Ok(Connection::from_tcp(stream, peer))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local", &self.local)
            .finish()
    }
}
