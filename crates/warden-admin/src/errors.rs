//! Error types surfaced by the administration client.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use warden_wire::FrameError;

/// Failures while talking to the dispatcher.
#[derive(Debug, Error)]
pub enum AdminClientError {
    /// `--tls` was given without a trust anchor.
    #[error("--tls requires --ca-file")]
    MissingCaFile,
    /// The CA bundle could not be read.
    #[error("failed to read CA file '{path}': {source}")]
    CaFile {
        /// Configured bundle path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The CA bundle contained no usable certificate.
    #[error("no usable certificates in '{path}'")]
    NoCertificates {
        /// Configured bundle path.
        path: PathBuf,
    },
    /// The host is not a valid TLS server name.
    #[error("'{host}' is not a valid TLS server name")]
    ServerName {
        /// Host passed with `--host`.
        host: String,
    },
    /// The TLS session could not be set up.
    #[error("TLS failure: {0}")]
    Tls(#[from] rustls::Error),
    /// Connecting to the dispatcher failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// `host:port` that was dialled.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Sending the request or receiving the reply failed.
    #[error("dispatcher failed to respond: {0}")]
    Exchange(#[source] io::Error),
    /// The reply could not be decoded.
    #[error("returned data appears to be corrupt: {0}")]
    Corrupt(#[from] FrameError),
    /// The dispatcher answered `HELLO` with something unexpected.
    #[error("invalid hello result '{reply}'")]
    InvalidHello {
        /// Payload received.
        reply: String,
    },
    /// The dispatcher rejected the request.
    #[error("dispatcher failed {operation} request: {message}")]
    Rejected {
        /// Description of the operation.
        operation: &'static str,
        /// Message sent by the dispatcher.
        message: String,
    },
}
