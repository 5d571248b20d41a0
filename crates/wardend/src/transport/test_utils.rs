//! Test helpers for the transport module.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use super::{ConnectionStream, SocketListener};

/// Polls `listener` until a connection arrives or `timeout` elapses.
pub(crate) fn accept_within(
    listener: &mut SocketListener,
    timeout: Duration,
) -> Option<(TcpStream, SocketAddr)> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(accepted) = listener.try_accept() {
            return Some(accepted);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

/// A connected loopback pair: the server side as a dispatcher stream and the
/// raw client socket.
pub(crate) fn connected_pair() -> (ConnectionStream, TcpStream) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback listener");
    let addr = listener.local_addr().expect("loopback address");
    let client = TcpStream::connect(addr).expect("connect loopback client");
    let (server, _) = listener.accept().expect("accept loopback client");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("client timeout");
    (ConnectionStream::Plain(server), client)
}
