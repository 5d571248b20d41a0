//! Reading request frames from and writing reply frames to a connection.

mod codec;
mod errors;

pub(crate) use self::codec::{READ_TIMEOUT, Request, read_request, write_reply};
pub use self::errors::CodecError;

pub(crate) const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// Message sent when a frame cannot be decoded.
pub(crate) const INVALID_DATA: &str = "Invalid data received";
