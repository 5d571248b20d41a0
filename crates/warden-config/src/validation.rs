//! Consistency checks for the listener and worker port layout.

use thiserror::Error;

use crate::Config;

/// Reasons a merged configuration cannot be used to start the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// Plain and TLS listeners were configured on the same port.
    #[error("plain and TLS listeners cannot share port {port}")]
    ListenerPortsCollide { port: u16 },
    /// A listener port falls inside the worker port range.
    #[error("listener port {port} lies inside the worker port range {base}..{end}")]
    ListenerInWorkerRange { port: u16, base: u16, end: u32 },
    /// The worker table must be able to hold at least one worker.
    #[error("max_workers must be at least 1")]
    NoWorkers,
    /// Mandatory TLS was requested without certificate material.
    #[error("encryption = only requires certificate_file and private_key_file")]
    MissingTlsMaterial,
}

impl Config {
    /// Rejects port layouts the dispatcher cannot serve.
    ///
    /// With TLS enabled the two listeners must use distinct ports. When a
    /// worker base port is configured, neither listener may fall into
    /// `[base, base + max_workers)`.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_workers == 0 {
            return Err(ConfigValidationError::NoWorkers);
        }
        let encryption = self.encryption();
        if encryption.tls_enabled() && self.plain_port == self.tls_port {
            return Err(ConfigValidationError::ListenerPortsCollide {
                port: self.plain_port,
            });
        }
        if encryption.plain_refused()
            && (self.certificate_file.is_none() || self.private_key_file.is_none())
        {
            return Err(ConfigValidationError::MissingTlsMaterial);
        }
        if let Some(base) = self.worker_base_port {
            let end = u32::from(base) + self.max_workers;
            let mut listeners = vec![self.plain_port];
            if encryption.tls_enabled() {
                listeners.push(self.tls_port);
            }
            if let Some(port) = listeners
                .into_iter()
                .find(|port| (u32::from(base)..end).contains(&u32::from(*port)))
            {
                return Err(ConfigValidationError::ListenerInWorkerRange { port, base, end });
            }
        }
        Ok(())
    }
}
