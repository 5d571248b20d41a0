//! Plain and TLS connections to the dispatcher.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore, ServerName, StreamOwned};

use crate::AdminClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const IO_TIMEOUT: Duration = Duration::from_secs(20);

/// Where and how to reach the dispatcher.
#[derive(Clone)]
pub(crate) struct Endpoint {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) tls: Option<Arc<ClientConfig>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl Endpoint {
    pub(crate) fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
        }
    }

    /// Builds a TLS endpoint trusting the certificates in `ca_file`.
    pub(crate) fn tls(
        host: impl Into<String>,
        port: u16,
        ca_file: &Path,
    ) -> Result<Self, AdminClientError> {
        Ok(Self {
            host: host.into(),
            port,
            tls: Some(Arc::new(client_config(ca_file)?)),
        })
    }

    /// Opens a new connection; the dispatcher serves one request per connection.
    pub(crate) fn connect(&self) -> Result<Connection, AdminClientError> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let connect_error = |source| AdminClientError::Connect {
            endpoint: endpoint.clone(),
            source,
        };
        let address = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(connect_error)?
            .next()
            .ok_or_else(|| {
                connect_error(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "no resolved addresses",
                ))
            })?;
        let stream = TcpStream::connect_timeout(&address, CONNECT_TIMEOUT).map_err(connect_error)?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(connect_error)?;
        let Some(config) = &self.tls else {
            return Ok(Connection::Plain(stream));
        };
        let server_name =
            ServerName::try_from(self.host.as_str()).map_err(|_| AdminClientError::ServerName {
                host: self.host.clone(),
            })?;
        let session = ClientConnection::new(Arc::clone(config), server_name)?;
        Ok(Connection::Tls(Box::new(StreamOwned::new(session, stream))))
    }
}

fn client_config(ca_file: &Path) -> Result<ClientConfig, AdminClientError> {
    let ca_error = |source| AdminClientError::CaFile {
        path: ca_file.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(ca_file).map_err(ca_error)?);
    let certificates = rustls_pemfile::certs(&mut reader).map_err(ca_error)?;
    let mut roots = RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(&certificates);
    if added == 0 {
        return Err(AdminClientError::NoCertificates {
            path: ca_file.to_path_buf(),
        });
    }
    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// An open connection to the dispatcher.
pub(crate) enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}
