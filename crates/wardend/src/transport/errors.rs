//! Error types for listener and TLS operations.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while binding the listening sockets.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
}

/// Errors raised while loading TLS material or accepting a TLS session.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read.
    #[error("failed to read TLS file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The certificate file held no certificates.
    #[error("no certificates found in '{path}'")]
    NoCertificates { path: PathBuf },
    /// The key file held no PKCS#8 or RSA private key.
    #[error("no private key found in '{path}'")]
    NoPrivateKey { path: PathBuf },
    /// The TLS listener is enabled but no certificate material is configured.
    #[error("TLS listener requires certificate_file and private_key_file")]
    MissingMaterial,
    /// rustls rejected the certificate and key pair.
    #[error("invalid TLS configuration: {0}")]
    Config(#[source] rustls::Error),
    /// The session could not be created.
    #[error("failed to create TLS session: {0}")]
    Session(#[source] rustls::Error),
    /// The handshake with the peer failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),
}
