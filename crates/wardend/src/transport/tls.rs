//! TLS session setup for the encrypted listener.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::{Certificate, PrivateKey, ServerConfig, ServerConnection, StreamOwned};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use tracing::debug;

use super::{ConnectionStream, LISTENER_TARGET, TlsError};

/// Wraps accepted sockets in a server-side TLS session.
pub(crate) trait TlsAcceptor: Send {
    /// Completes the handshake on `stream`.
    fn accept(&self, stream: TcpStream) -> Result<ConnectionStream, TlsError>;
}

/// Acceptor backed by `rustls` with a single certificate chain.
#[derive(Debug, Clone)]
pub(crate) struct RustlsAcceptor {
    config: Arc<ServerConfig>,
}

impl RustlsAcceptor {
    /// Loads the PEM certificate chain and private key.
    pub(crate) fn from_files(certificate: &Path, private_key: &Path) -> Result<Self, TlsError> {
        let chain = load_certificates(certificate)?;
        let key = load_private_key(private_key)?;
        let config = ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .map_err(TlsError::Config)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }
}

impl TlsAcceptor for RustlsAcceptor {
    fn accept(&self, mut stream: TcpStream) -> Result<ConnectionStream, TlsError> {
        let mut session =
            ServerConnection::new(Arc::clone(&self.config)).map_err(TlsError::Session)?;
        while session.is_handshaking() {
            session
                .complete_io(&mut stream)
                .map_err(TlsError::Handshake)?;
        }
        debug!(target: LISTENER_TARGET, "TLS handshake complete");
        Ok(ConnectionStream::Tls(Box::new(StreamOwned::new(
            session, stream,
        ))))
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certificates(path: &Path) -> Result<Vec<Certificate>, TlsError> {
    let mut reader = open(path)?;
    let chain = certs(&mut reader).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if chain.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(chain.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey, TlsError> {
    let read_error = |source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut keys = pkcs8_private_keys(&mut open(path)?).map_err(read_error)?;
    if keys.is_empty() {
        keys = rsa_private_keys(&mut open(path)?).map_err(read_error)?;
    }
    keys.into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_certificate_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let error = RustlsAcceptor::from_files(&dir.path().join("absent.pem"), dir.path())
            .expect_err("missing file");
        assert!(matches!(error, TlsError::Read { .. }));
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let cert = dir.path().join("cert.pem");
        fs::write(&cert, "not a pem file\n").expect("write cert");
        let error = RustlsAcceptor::from_files(&cert, &cert).expect_err("empty pem");
        assert!(matches!(error, TlsError::NoCertificates { .. }));
    }
}
