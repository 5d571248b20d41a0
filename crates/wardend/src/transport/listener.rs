//! Non-blocking TCP listeners polled by the dispatcher loop.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{info, warn};

use crate::protocol::READ_TIMEOUT;

use super::{LISTENER_TARGET, ListenerError};

/// Which listener a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Plain,
    Tls,
}

impl fmt::Display for Channel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => formatter.write_str("plain"),
            Self::Tls => formatter.write_str("tls"),
        }
    }
}

/// Listener bound to one of the dispatcher ports.
#[derive(Debug)]
pub(crate) struct SocketListener {
    channel: Channel,
    listener: TcpListener,
    local_addr: SocketAddr,
    last_error: Option<io::ErrorKind>,
}

impl SocketListener {
    /// Binds `host:port` and switches the socket to non-blocking accepts.
    pub(crate) fn bind(host: &str, port: u16, channel: Channel) -> Result<Self, ListenerError> {
        let listener = bind_tcp(host, port)?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::NonBlocking { source })?;
        info!(
            target: LISTENER_TARGET,
            %channel,
            address = %local_addr,
            "listener active"
        );
        Ok(Self {
            channel,
            listener,
            local_addr,
            last_error: None,
        })
    }

    pub(crate) const fn channel(&self) -> Channel {
        self.channel
    }

    pub(crate) const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one pending connection, if any.
    ///
    /// The returned stream is blocking with the receive timeout applied.
    /// Accept failures are logged once per distinct error kind and reported as
    /// no connection.
    pub(crate) fn try_accept(&mut self) -> Option<(TcpStream, SocketAddr)> {
        match self.listener.accept().and_then(prepare_stream) {
            Ok(accepted) => {
                self.last_error = None;
                Some(accepted)
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => None,
            Err(error) => {
                let kind = error.kind();
                if self.last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        channel = %self.channel,
                        error = %error,
                        "socket accept error"
                    );
                }
                self.last_error = Some(kind);
                None
            }
        }
    }
}

fn prepare_stream(
    (stream, peer): (TcpStream, SocketAddr),
) -> io::Result<(TcpStream, SocketAddr)> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_nodelay(true)?;
    Ok((stream, peer))
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}
