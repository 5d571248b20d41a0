//! Detaches the dispatcher from its controlling terminal.

use thiserror::Error;
use warden_config::RuntimePaths;

/// Strategy used to move the process into the background.
pub(crate) trait Daemonizer: Send + Sync {
    /// Detaches the process; only the detached child returns.
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[cfg(unix)]
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
    /// The platform has no notion of detaching; run in the foreground.
    #[cfg(not(unix))]
    #[error("background mode is unsupported on this platform; set WARDEN_FOREGROUND")]
    Unsupported,
}

/// Daemoniser backed by `daemonize-me`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemDaemonizer;

#[cfg(unix)]
impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        use std::ffi::OsStr;

        use daemonize_me::Daemon;
        use tracing::info;

        use super::PROCESS_TARGET;

        info!(
            target: PROCESS_TARGET,
            runtime = %paths.runtime_dir().display(),
            "detaching from the terminal"
        );
        Daemon::new()
            .work_dir(paths.runtime_dir())
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(target: PROCESS_TARGET, "running detached");
        Ok(())
    }
}

#[cfg(not(unix))]
impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        Err(DaemonizeError::Unsupported)
    }
}
