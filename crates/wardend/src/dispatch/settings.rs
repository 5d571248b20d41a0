//! Configuration values the dispatcher consults on every request.

use std::path::PathBuf;
use std::time::Duration;

use warden_config::Config;

use super::DispatchError;

/// Dispatcher view of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DispatchSettings {
    /// Port of the plain listener; workers call back on it.
    pub(crate) plain_port: u16,
    /// Port of the TLS listener, when one is bound.
    pub(crate) tls_port: Option<u16>,
    /// First port of the worker range.
    pub(crate) worker_base_port: Option<u16>,
    /// Reject requests that did not arrive over TLS.
    pub(crate) plain_refused: bool,
    pub(crate) worker_binary: PathBuf,
    /// Configuration path handed to workers.
    pub(crate) worker_config: String,
    pub(crate) work_dir: PathBuf,
    pub(crate) debug_level: u8,
    /// Initial worker table capacity.
    pub(crate) max_workers: usize,
    /// Minimum pause between two accepts on one listener.
    pub(crate) new_connection_delay: Duration,
}

impl DispatchSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        let encryption = config.encryption();
        Self {
            plain_port: config.plain_port,
            tls_port: encryption.tls_enabled().then_some(config.tls_port),
            worker_base_port: config.worker_base_port,
            plain_refused: encryption.plain_refused(),
            worker_binary: config.worker_binary().into_std_path_buf(),
            worker_config: config.worker_config().to_owned(),
            work_dir: config.work_dir().as_std_path().to_path_buf(),
            debug_level: config.debug_level,
            max_workers: config.max_workers(),
            new_connection_delay: Duration::from_millis(config.new_connection_delay_ms),
        }
    }

    /// Replaces the configured ports with the ones actually bound.
    ///
    /// Binding port zero lets the operating system choose, so the callback
    /// port handed to workers must come from the listener.
    #[must_use]
    pub(crate) fn with_bound_ports(mut self, plain_port: u16, tls_port: Option<u16>) -> Self {
        self.plain_port = plain_port;
        self.tls_port = tls_port;
        self
    }

    /// Port assigned to the worker in zero-based `slot`.
    pub(crate) fn worker_port(&self, slot: usize) -> Result<u16, DispatchError> {
        let base = self.worker_base_port.ok_or(DispatchError::NoWorkerRange)?;
        let port = u16::try_from(slot)
            .ok()
            .and_then(|offset| base.checked_add(offset))
            .ok_or(DispatchError::PortExhausted { slot: slot + 1 })?;
        if port == self.plain_port || self.tls_port == Some(port) {
            return Err(DispatchError::PortCollision { port });
        }
        Ok(port)
    }
}
