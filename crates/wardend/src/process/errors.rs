//! Defines the error surface of the launch sequence.

use std::io;
use std::path::PathBuf;
use std::time::SystemTimeError;

use thiserror::Error;
use warden_config::RuntimePathsError;

use crate::audit::AuditLogError;
use crate::bootstrap::BootstrapError;
use crate::transport::{ListenerError, TlsError};

use super::daemonizer::DaemonizeError;
use super::signals::ShutdownError;

/// Errors surfaced while launching or supervising the dispatcher.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Loading configuration or installing telemetry failed.
    #[error("bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The runtime directory could not be prepared.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// A configured path could not be made absolute before detaching.
    #[error("failed to resolve '{path}': {source}")]
    ResolvePath {
        /// Configured path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A running dispatcher already holds the lock.
    #[error("dispatcher already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded by the running dispatcher.
        pid: u32,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Artefact that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the health snapshot failed.
    #[error("failed to write health snapshot '{path}': {source}")]
    HealthWrite {
        /// Health file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {source}")]
    HealthSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying system time error.
        #[source]
        source: SystemTimeError,
    },
    /// Probing the PID of a previous dispatcher failed.
    #[cfg(unix)]
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID that failed to probe.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: nix::errno::Errno,
    },
    /// Health updates were attempted before writing the PID file.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Signal forwarding could not be installed.
    #[error("failed to forward signals: {source}")]
    Shutdown {
        /// Underlying signal error.
        #[source]
        source: ShutdownError,
    },
    /// A listener could not be bound.
    #[error("listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// TLS material could not be loaded.
    #[error("TLS setup failed: {source}")]
    Tls {
        /// Underlying TLS error.
        #[source]
        source: TlsError,
    },
    /// The audit log could not be opened.
    #[error("audit log unavailable: {source}")]
    Audit {
        /// Underlying audit log error.
        #[source]
        source: AuditLogError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<TlsError> for LaunchError {
    fn from(source: TlsError) -> Self {
        Self::Tls { source }
    }
}

impl From<AuditLogError> for LaunchError {
    fn from(source: AuditLogError) -> Self {
        Self::Audit { source }
    }
}
