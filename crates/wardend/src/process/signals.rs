//! Forwards process signals to the dispatcher as [`SupervisorEvent`]s.
//!
//! Signal handlers only set flags; a dedicated thread turns each delivery into
//! a channel message so the dispatcher never runs logic in signal context.

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::dispatch::SupervisorEvent;

/// Errors raised while installing signal forwarding.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing the signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The forwarding thread could not be started.
    #[error("failed to start the signal thread: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Source of child-exit and termination notifications.
pub(crate) trait SignalSource: Send + Sync {
    /// Starts delivering events to `events` until the receiver disconnects.
    fn subscribe(&self, events: Sender<SupervisorEvent>) -> Result<(), ShutdownError>;
}

/// Forwards operating-system signals.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemSignals;

#[cfg(unix)]
impl SignalSource for SystemSignals {
    fn subscribe(&self, events: Sender<SupervisorEvent>) -> Result<(), ShutdownError> {
        use std::thread;

        use signal_hook::consts::signal::{SIGCHLD, SIGHUP, SIGINT, SIGQUIT, SIGTERM};
        use signal_hook::iterator::Signals;
        use tracing::{debug, info};

        use super::PROCESS_TARGET;

        let mut signals = Signals::new([SIGCHLD, SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        thread::Builder::new()
            .name("warden-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    let event = if signal == SIGCHLD {
                        debug!(target: PROCESS_TARGET, "child state changed");
                        SupervisorEvent::ChildExited
                    } else {
                        info!(target: PROCESS_TARGET, signal, "termination signal received");
                        SupervisorEvent::Terminate(signal)
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| ShutdownError::Thread { source })?;
        Ok(())
    }
}

#[cfg(not(unix))]
impl SignalSource for SystemSignals {
    fn subscribe(&self, events: Sender<SupervisorEvent>) -> Result<(), ShutdownError> {
        tracing::debug!(
            target: super::PROCESS_TARGET,
            "no signal forwarding on this platform; relying on the polling reaper"
        );
        drop(events);
        Ok(())
    }
}
