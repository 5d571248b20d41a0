//! Listening sockets for the plain and TLS channels.
//!
//! Both listeners are non-blocking and polled by the dispatcher loop; an
//! accepted stream is switched back to blocking mode with the receive timeout
//! applied before any bytes are read. TLS connections complete their handshake
//! in [`TlsAcceptor::accept`] so the dispatcher only ever sees a ready stream.

mod errors;
mod listener;
mod stream;
#[cfg(test)]
pub(crate) mod test_utils;
mod tls;

pub use self::errors::{ListenerError, TlsError};
pub(crate) use self::listener::{Channel, SocketListener};
pub(crate) use self::stream::ConnectionStream;
pub(crate) use self::tls::{RustlsAcceptor, TlsAcceptor};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
