use std::io;

use thiserror::Error;
use warden_wire::{Correlation, FrameError};

/// Failures while exchanging frames with a peer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer closed the connection before a complete frame arrived.
    #[error("connection closed after {received} bytes")]
    Closed {
        /// Bytes received before the close.
        received: usize,
    },
    /// No data arrived within the receive timeout.
    #[error("timed out waiting for request data")]
    TimedOut,
    /// The frame header could not be decoded.
    #[error("malformed frame: {source}")]
    Frame {
        /// Correlation bytes the peer sent, echoed in the error reply.
        correlation: Correlation,
        /// Decoding failure.
        #[source]
        source: FrameError,
    },
    /// A reply could not be encoded.
    #[error("failed to encode reply: {0}")]
    Encode(#[source] FrameError),
    /// Reading or writing the socket failed.
    #[error("socket error: {0}")]
    Io(#[source] io::Error),
}

impl CodecError {
    /// Whether the peer should be told its data was invalid.
    pub(crate) const fn is_malformed(&self) -> bool {
        matches!(self, Self::Frame { .. })
    }

    /// Correlation of the offending request, when the header arrived.
    pub(crate) const fn correlation(&self) -> Option<Correlation> {
        match self {
            Self::Frame { correlation, .. } => Some(*correlation),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(error),
        }
    }
}
